use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();
    match opsbox::cli::run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}
