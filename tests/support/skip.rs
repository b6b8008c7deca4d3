/// Skip a test when a host tool is not on PATH.
#[macro_export]
macro_rules! skip_without_tool {
    ($tool:expr) => {
        if std::process::Command::new($tool)
            .arg("--version")
            .output()
            .is_err()
        {
            eprintln!("SKIPPED: {} not installed", $tool);
            return;
        }
    };
}
