use std::process::ExitCode;

fn main() -> ExitCode {
    ormtour::tracing::init();

    match ormtour::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
