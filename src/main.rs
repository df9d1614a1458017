mod cli;
mod commands;
mod env_loader;
mod error;
mod logging;
mod ndnp;

fn main() {
    env_loader::load_dotenv();

    if let Err(err) = cli::run() {
        eprintln!("error: {err:#}");
        if let Some(code) = error::repair_error_code(&err) {
            eprintln!("code: {}", code.as_str());
        }
        std::process::exit(1);
    }
}
