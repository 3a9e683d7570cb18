use std::process;

pub fn ensure_posix_or_exit() {
    if !cfg!(unix) {
        eprintln!("unsupported platform: Foreman is intended for POSIX systems");
        process::exit(2);
    }
}
