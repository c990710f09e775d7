mod cli;
mod infra;
mod reconcile;
mod routes;
mod server;

use roster_sync::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
