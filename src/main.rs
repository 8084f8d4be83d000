fn main() {
    if let Err(err) = winaudit::cli::run() {
        winaudit::ui::eprintln_error(&err);
        std::process::exit(winaudit::exit::exit_code(&err));
    }
}
