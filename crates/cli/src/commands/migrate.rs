use crate::commands::{build_runtime, connect, load_config, CommandResult};
use grocer_db::migrations;

pub fn run() -> CommandResult {
    let config = match load_config("migrate") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect("migrate", &config).await?;
        let applied = migrations::run_pending(&pool).await.map_err(|error| {
            CommandResult::failure("migrate", "migration", error.to_string(), 5)
        });
        pool.close().await;
        applied
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => failure,
    }
}
