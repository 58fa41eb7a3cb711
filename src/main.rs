mod app;
mod entry;
mod logger;
mod shutdown_handlers;

use ratelimit_tester::error::AppResult;

fn main() -> AppResult<()> {
    entry::run()
}
