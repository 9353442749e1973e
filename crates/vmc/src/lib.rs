//! VM-to-Hack-assembly translator library.

pub mod codegen;
pub mod command;

use std::path::Path;

use n2t_diagnostics::Result;

pub use n2t_diagnostics::Error;

/// Translate one or more VM files into a single combined assembly
/// program. `files` pairs each file's path (used for bootstrap detection
/// and static-segment naming) with its source text, in the order they
/// should be emitted.
pub fn translate_program(files: &[(&Path, &str)]) -> Result<String> {
    let mut emitter = codegen::AsmEmitter::new();

    let has_sys = files
        .iter()
        .any(|(path, _)| path.file_name().and_then(|n| n.to_str()) == Some("Sys.vm"));
    if has_sys {
        emitter.write_bootstrap();
    }

    for (path, source) in files {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unnamed");
        emitter.set_current_file(stem);
        let commands = command::parse(source)?;
        codegen::translate_commands(&mut emitter, &commands)?;
    }

    Ok(emitter.render())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn single_file_without_sys_vm_skips_bootstrap() {
        let path = PathBuf::from("Foo.vm");
        let source = "push constant 1\npush constant 2\nadd\n";
        let asm = translate_program(&[(&path, source)]).unwrap();
        assert!(!asm.contains("@Sys.init"));
        assert!(asm.contains("@1"));
    }

    #[test]
    fn sys_vm_present_triggers_bootstrap_before_anything_else() {
        let sys_path = PathBuf::from("Sys.vm");
        let sys_source = "function Sys.init 0\ncall Main.main 0\nreturn\n";
        let main_path = PathBuf::from("Main.vm");
        let main_source = "function Main.main 0\npush constant 0\nreturn\n";
        let asm = translate_program(&[(&sys_path, sys_source), (&main_path, main_source)]).unwrap();
        let bootstrap_pos = asm.find("@Sys.init").unwrap();
        let sys_init_fn_pos = asm.find("(Sys.init)").unwrap();
        assert!(bootstrap_pos < sys_init_fn_pos);
    }

    #[test]
    fn static_segment_is_mangled_per_file() {
        let path = PathBuf::from("Foo.vm");
        let source = "push constant 5\npop static 0\n";
        let asm = translate_program(&[(&path, source)]).unwrap();
        assert!(asm.contains("@Foo.0"));
    }
}
