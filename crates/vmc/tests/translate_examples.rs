use std::path::Path;

#[test]
fn push_constant_and_add_produce_expected_sequence() {
    let source = "push constant 7\npush constant 8\nadd\n";
    let asm = vmc::translate_program(&[(Path::new("Foo.vm"), source)]).unwrap();
    assert!(asm.contains("@7"));
    assert!(asm.contains("@8"));
    assert!(asm.contains("M=M+D"));
}

#[test]
fn eq_true_sets_minus_one_via_bool_labels() {
    let source = "push constant 5\npush constant 5\neq\n";
    let asm = vmc::translate_program(&[(Path::new("Foo.vm"), source)]).unwrap();
    assert!(asm.contains("D;JEQ"));
    assert!(asm.contains("M=-1"));
    assert!(asm.contains("M=0"));
}

#[test]
fn function_call_round_trip_with_sys_init_bootstrap() {
    let sys_source = "function Sys.init 0\ncall Main.main 0\npop temp 0\npush constant 0\nreturn\n";
    let main_source = "function Main.main 0\npush constant 42\nreturn\n";
    let asm = vmc::translate_program(&[
        (Path::new("Sys.vm"), sys_source),
        (Path::new("Main.vm"), main_source),
    ])
    .unwrap();

    assert!(asm.contains("@256"));
    let bootstrap_idx = asm.find("@Sys.init").unwrap();
    let sys_fn_idx = asm.find("(Sys.init)").unwrap();
    assert!(bootstrap_idx < sys_fn_idx);

    assert!(asm.contains("(Main.main)"));
    assert!(asm.contains("@42"));
    // return sequence restores caller frame via R13
    assert!(asm.contains("@R13"));
    assert!(asm.contains("(Sys.init$return_0)"));
}

#[test]
fn rejects_malformed_vm_source() {
    let source = "push constant\n";
    assert!(vmc::translate_program(&[(Path::new("Foo.vm"), source)]).is_err());
}
