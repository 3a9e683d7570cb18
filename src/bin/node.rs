use std::process;
use std::sync::Arc;

use serde_json::json;

use foreman::config::AppConfig;
use foreman::logging::{LogLevel, Logger, LoggerConfig};
use foreman::node::NodeRuntime;
use foreman::server::DispatchServer;
use foreman::shutdown::ShutdownHooks;
use foreman::utils::{banner, runtime};

fn main() {
    runtime::ensure_posix_or_exit();
    banner::print_startup_banner("node");

    let app_config = load_config_or_exit();
    let logger = build_logger_or_exit(&app_config);

    let node_runtime = Arc::new(NodeRuntime::new(Arc::clone(&logger)));
    let server = DispatchServer::bind(
        &app_config.node.host,
        app_config.node.port,
        Arc::clone(&logger),
    )
    .unwrap_or_else(|error| {
        eprintln!("dispatch server startup error: {error}");
        process::exit(2);
    });
    let bound_addr = server.local_addr().unwrap_or_else(|error| {
        eprintln!("dispatch server startup error: failed to read local address: {error}");
        process::exit(2);
    });
    logger.log(
        LogLevel::Info,
        Some("node::main"),
        &format!(
            "{} v{} started worker dispatch server",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ),
        Some(json!({
            "bind_address": bound_addr.to_string(),
            "host": app_config.node.host,
            "port": app_config.node.port
        })),
    );

    let shutdown_hooks = ShutdownHooks::install().unwrap_or_else(|error| {
        eprintln!("failed to install shutdown hooks: {error}");
        process::exit(2);
    });
    logger.info(
        Some("node::main"),
        "shutdown hooks installed for SIGINT/SIGTERM",
    );

    server.serve(node_runtime.handler(), shutdown_hooks.flag());

    logger.info(
        Some("node::main"),
        "shutdown signal received, dispatch server stopped",
    );
}

fn load_config_or_exit() -> AppConfig {
    match AppConfig::load_with_discovery(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("configuration error: {error}");
            process::exit(2);
        }
    }
}

fn build_logger_or_exit(app_config: &AppConfig) -> Arc<Logger> {
    let min_level = LogLevel::from_config_value(&app_config.logging.level).unwrap_or_else(|| {
        eprintln!(
            "invalid logging.level '{}'. Allowed values: error, warn, info, debug",
            app_config.logging.level
        );
        process::exit(2);
    });

    Arc::new(Logger::new(LoggerConfig {
        min_level,
        human_friendly: app_config.logging.human_friendly,
    }))
}
