pub fn print_startup_banner(role: &str) {
    const RESET: &str = "\x1b[0m";
    const BANNER_COLOR: &str = "\x1b[38;5;110m";
    const DIM_GRAY: &str = "\x1b[2;90m";
    const BANNER: &str = r#"
  ░█▀▀░█▀█░█▀▄░█▀▀░█▄█░█▀█░█▀█
  ░█▀▀░█░█░█▀▄░█▀▀░█░█░█▀█░█░█
  ░▀░░░▀▀▀░▀░▀░▀▀▀░▀░▀░▀░▀░▀░▀"#;
    const APP_DESCRIPTION: &str = "Controller/worker job distribution runtime over TCP.";
    const REPO_URL: &str = "https://github.com/foreman-runtime/foreman";
    const LICENSE_NOTICE: &str =
        "MIT License disclaimer: software is provided \"AS IS\", without warranty or liability.";

    println!("{BANNER_COLOR}{BANNER}{RESET}");
    println!(
        "{} v{} ({role}) | build {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("FOREMAN_BUILD_DATE_UTC")
    );
    println!("{APP_DESCRIPTION}");
    println!("Repository: {REPO_URL}");
    println!("{DIM_GRAY}{LICENSE_NOTICE}{RESET}");
    println!();
}
