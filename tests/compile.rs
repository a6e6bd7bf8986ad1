mod common;

use common::*;
use tacc::{
    compile,
    config::{DebugOptions, Features, Optimisations},
    il::*,
    CompileError, Config, Platform,
};

fn return_via_copies() -> TacProgram {
    program(vec![Function::new(
        "main",
        vec![],
        Some(Type::Int),
        vec![
            TacInstr::Bin(int("x"), BinOp::Add, cnst(1), cnst(2)),
            TacInstr::Copy(int("y"), var("x")),
            TacInstr::Return(Some(var("y"))),
        ],
    )])
}

#[test]
fn folded_constant_is_returned_without_a_frame() {
    init_logging();
    let output = compile(&return_via_copies(), &Config::new(Platform::Linux)).unwrap();

    assert_eq!(
        vec![
            ".intel_syntax noprefix",
            ".globl main",
            ".text",
            "main:",
            "push rbp",
            "mov rbp, rsp",
            "mov eax, 3",
            "mov rsp, rbp",
            "pop rbp",
            "ret",
            ".section .note.GNU-stack,\"\",@progbits",
        ],
        lines(&output.assembly)
    );
    assert!(output.dumps.is_empty());
}

#[test]
fn unoptimised_copies_are_coalesced_into_the_return_register() {
    init_logging();
    let config = Config::new(Platform::Linux).with_optimisations(Optimisations::none());
    let output = compile(&return_via_copies(), &config).unwrap();
    let lines = lines(&output.assembly);

    assert!(lines.contains(&"mov eax, 1".to_string()));
    assert!(lines.contains(&"add eax, 2".to_string()));
    assert!(!output.assembly.contains("rbp-"));
    assert!(!output.assembly.contains("sub rsp"));
}

fn call_putchar() -> TacProgram {
    program(vec![Function::new(
        "main",
        vec![],
        Some(Type::Int),
        vec![
            TacInstr::Call(None, "putchar".to_string(), vec![cnst(65)]),
            TacInstr::Return(Some(cnst(0))),
        ],
    )])
}

#[test]
fn linux_calls_go_through_the_plt() {
    init_logging();
    let output = compile(&call_putchar(), &Config::new(Platform::Linux)).unwrap();
    let lines = lines(&output.assembly);

    assert!(lines.contains(&"mov edi, 65".to_string()));
    assert!(lines.contains(&"call putchar@PLT".to_string()));
    assert!(output.assembly.contains(".note.GNU-stack"));
}

#[test]
fn macos_symbols_are_prefixed() {
    init_logging();
    let output = compile(&call_putchar(), &Config::new(Platform::MacOs)).unwrap();
    let lines = lines(&output.assembly);

    assert!(lines.contains(&".globl _main".to_string()));
    assert!(lines.contains(&"_main:".to_string()));
    assert!(lines.contains(&"call _putchar".to_string()));
    assert!(!output.assembly.contains("GNU-stack"));
}

#[test]
fn values_spill_to_the_stack_under_pressure() {
    init_logging();
    let count = 20;
    let mut body: Vec<TacInstr> = (0..count)
        .map(|i| TacInstr::Copy(int(&format!("v{i}")), cnst(i)))
        .collect();
    body.push(TacInstr::Bin(int("s1"), BinOp::Add, var("v0"), var("v1")));
    for i in 2..count {
        body.push(TacInstr::Bin(
            int(&format!("s{i}")),
            BinOp::Add,
            var(&format!("s{}", i - 1)),
            var(&format!("v{i}")),
        ));
    }
    body.push(TacInstr::Return(Some(var(&format!("s{}", count - 1)))));

    let config = Config::new(Platform::Linux).with_optimisations(Optimisations::none());
    let output = compile(
        &program(vec![Function::new("main", vec![], Some(Type::Int), body)]),
        &config,
    )
    .unwrap();

    let lines = lines(&output.assembly);
    assert!(lines.iter().any(|l| l.starts_with("sub rsp, ")));
    assert!(output.assembly.contains("[rbp-"));
}

#[test]
fn statics_are_addressed_relative_to_rip() {
    init_logging();
    let counter = Variable::new("counter", Type::Int);
    let prog = TacProgram {
        functions: vec![Function::new(
            "main",
            vec![],
            Some(Type::Int),
            vec![
                TacInstr::Bin(int("tmp"), BinOp::Add, Value::Var(counter.clone()), cnst(1)),
                TacInstr::Copy(counter.clone(), var("tmp")),
                TacInstr::Return(Some(Value::Var(counter))),
            ],
        )],
        statics: vec![StaticVariable::new("counter", true, Const::Int(5))],
    };

    let output = compile(&prog, &Config::new(Platform::Linux)).unwrap();
    let lines = lines(&output.assembly);

    assert!(output.assembly.contains("counter[rip]"));
    assert!(lines.contains(&".data".to_string()));
    assert!(lines.contains(&"counter:".to_string()));
    assert!(lines.contains(&".long 5".to_string()));
}

#[test]
fn double_constants_live_in_read_only_data() {
    init_logging();
    let x = Variable::new("x", Type::Double);
    let r = Variable::new("r", Type::Double);
    let prog = program(vec![Function::new(
        "half",
        vec![x.clone()],
        Some(Type::Double),
        vec![
            TacInstr::Bin(
                r.clone(),
                BinOp::Multiply,
                Value::Var(x),
                Value::Const(Const::Double(0.5)),
            ),
            TacInstr::Return(Some(Value::Var(r))),
        ],
    )]);

    let output = compile(&prog, &Config::new(Platform::Linux)).unwrap();
    let lines = lines(&output.assembly);

    assert!(lines.iter().any(|l| l.starts_with("mulsd xmm0")));
    assert!(lines.contains(&".section .rodata".to_string()));
    assert!(lines.contains(&".quad 4602678819172646912".to_string()));
}

#[test]
fn undefined_labels_are_malformed() {
    init_logging();
    let prog = program(vec![Function::new(
        "main",
        vec![],
        Some(Type::Int),
        vec![
            TacInstr::Jump(Label::new("missing", 1)),
            TacInstr::Return(Some(cnst(0))),
        ],
    )]);

    let err = compile(&prog, &Config::default()).unwrap_err();

    assert!(matches!(err, CompileError::MalformedIr { .. }));
    assert_eq!("main", err.function());
}

#[test]
fn disabled_floating_point_is_unsupported() {
    init_logging();
    let prog = TacProgram {
        functions: vec![],
        statics: vec![StaticVariable::new("d", false, Const::Double(1.0))],
    };
    let config = Config::new(Platform::Linux).with_features(Features {
        floating_point: false,
    });

    let err = compile(&prog, &config).unwrap_err();

    assert!(matches!(err, CompileError::UnsupportedConstruct { .. }));
}

#[test]
fn dumps_are_recorded_for_the_selected_function() {
    init_logging();
    let mut prog = call_putchar();
    prog.functions.push(Function::new(
        "other",
        vec![],
        None,
        vec![TacInstr::Return(None)],
    ));
    let config = Config::new(Platform::Linux).with_debug(DebugOptions {
        dump_tac: true,
        dump_assembly: true,
        dump_interference: true,
        function_filter: Some("main".to_string()),
    });

    let output = compile(&prog, &config).unwrap();
    let stages: Vec<&str> = output.dumps.iter().map(|d| d.stage.as_str()).collect();

    assert!(output.dumps.iter().all(|d| d.function == "main"));
    assert!(stages.contains(&"tac"));
    assert!(stages.contains(&"asm.pseudo"));
    assert!(stages.contains(&"asm.allocated"));
    assert!(stages.contains(&"interference.general"));
    let general = output
        .dumps
        .iter()
        .find(|d| d.stage == "interference.general")
        .unwrap();
    assert!(general.contents.starts_with("graph general {"));
}

#[test]
fn compilation_is_deterministic() {
    init_logging();
    let config = Config::new(Platform::Linux).with_optimisations(Optimisations::none());
    let first = compile(&return_via_copies(), &config).unwrap();
    let second = compile(&return_via_copies(), &config).unwrap();

    assert_eq!(first.assembly, second.assembly);
}

#[test]
fn functions_without_a_trailing_return_still_return() {
    init_logging();
    let prog = program(vec![
        Function::new("f", vec![], None, vec![TacInstr::Copy(int("x"), cnst(1))]),
        Function::new(
            "main",
            vec![],
            Some(Type::Int),
            vec![
                TacInstr::Call(None, "f".to_string(), vec![]),
                TacInstr::Return(Some(cnst(7))),
            ],
        ),
    ]);

    for optimisations in [Optimisations::all(), Optimisations::none()] {
        let config = Config::new(Platform::Linux).with_optimisations(optimisations);
        let lines = lines(&compile(&prog, &config).unwrap().assembly);
        let start = lines.iter().position(|l| l == "f:").unwrap();
        let end = lines.iter().position(|l| l == ".globl main").unwrap();

        assert_eq!(
            vec!["mov rsp, rbp", "pop rbp", "ret"],
            lines[end - 3..end].to_vec()
        );
        assert!(start < end - 3);
        assert!(lines.contains(&"call f".to_string()));
    }
}
