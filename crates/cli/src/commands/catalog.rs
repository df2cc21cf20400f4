use grocer_handlers::catalog_population::{self, CatalogOperation};
use serde_json::json;

use crate::commands::{build_runtime, connect, load_config, CommandResult};

pub fn run(operation: CatalogOperation, clear_existing: bool) -> CommandResult {
    let config = match load_config("catalog") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("catalog") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let event = json!({
        "operation": match operation {
            CatalogOperation::Insert => "insert",
            CatalogOperation::Select => "select",
        },
        "clear_existing": clear_existing,
    });

    let result = runtime.block_on(async {
        let pool = connect("catalog", &config).await?;
        let response = catalog_population::handle_with_pool(&pool, &event).await;
        pool.close().await;
        Ok::<_, CommandResult>(response)
    });

    let response = match result {
        Ok(response) => response,
        Err(failure) => return failure,
    };

    let message = response.body["message"]
        .as_str()
        .or_else(|| response.body["error"].as_str())
        .unwrap_or_default()
        .to_string();

    if response.is_success() {
        CommandResult::success_with_data("catalog", message, Some(response.body))
    } else {
        CommandResult::failure_with_data("catalog", "catalog_operation", message, 5, Some(response.body))
    }
}
