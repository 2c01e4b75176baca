#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

mod application;
mod configuration;
mod domain;
mod infrastructure;

use std::env;
use std::process;

use anyhow::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use yansi::Paint;

use crate::application::cli;
use crate::application::cli::Mode;
use crate::application::repl;
use crate::application::server;
use crate::configuration::Config;

fn handle_error(err: Error) {
    eprintln!(
        "{}",
        Paint::red(format!(
            "llmchat has failed with the following app version and error.\n\nVersion: {}\nError: {:#}",
            env!("CARGO_PKG_VERSION"),
            err
        ))
    );

    let backtrace = err.backtrace();
    if backtrace.to_string() == "disabled backtrace" {
        let args = env::args().collect::<Vec<String>>().join(" ");
        eprintln!("\nRunning the following can help explain further what the issue is:");
        eprintln!("\nRUST_BACKTRACE=1 {args}");
    } else {
        eprintln!("\n{}", backtrace);
    }

    process::exit(1);
}

fn init_server_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| return EnvFilter::new("llmchat=info,tower_http=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// The terminal chat owns stdout, so logs go to a file and only when asked
/// for through `RUST_LOG`.
fn init_chat_logging() -> Option<WorkerGuard> {
    let wants_logs = env::var("RUST_LOG")
        .unwrap_or_else(|_| return "".to_string())
        .contains("llmchat");
    if !wants_logs {
        return None;
    }

    let log_path = Config::log_path();
    let log_dir = log_path.parent()?.to_path_buf();
    let file_name = log_path.file_name()?.to_os_string();

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .json()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(writer)
        .init();

    return Some(guard);
}

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    let mode = match cli::parse().await {
        Ok(Some(mode)) => mode,
        Ok(None) => process::exit(0),
        Err(err) => {
            handle_error(err);
            return;
        }
    };

    let res = match mode {
        Mode::Serve => {
            init_server_logging();
            server::start().await
        }
        Mode::Chat => {
            let _guard = init_chat_logging();
            repl::start().await
        }
    };

    if let Err(err) = res {
        handle_error(err);
    }

    process::exit(0);
}
