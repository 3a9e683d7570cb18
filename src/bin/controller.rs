use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::json;

use foreman::config::AppConfig;
use foreman::controller::Controller;
use foreman::logging::{LogLevel, Logger, LoggerConfig};
use foreman::schematic;
use foreman::shutdown::ShutdownHooks;
use foreman::utils::{banner, runtime, timing};

fn main() {
    runtime::ensure_posix_or_exit();
    banner::print_startup_banner("controller");

    let app_config = load_config_or_exit();
    let logger = build_logger_or_exit(&app_config);

    let fleet =
        schematic::load_fleet(&app_config.controller.schematic_file).unwrap_or_else(|error| {
            eprintln!("fleet file error: {error}");
            process::exit(2);
        });
    logger.log(
        LogLevel::Info,
        Some("controller::main"),
        "fleet schematics loaded",
        Some(json!({
            "schematic_file": app_config.controller.schematic_file,
            "declared_nodes": fleet.len()
        })),
    );

    let ping_interval = Duration::from_millis(app_config.heartbeat.interval_ms);
    let controller = timing::measure_execution(
        "fleet.bootstrap",
        Some("controller::main"),
        &logger,
        || Controller::bootstrap(fleet, ping_interval, Arc::clone(&logger)),
    );

    if controller.node_count() == 0 {
        logger.error(
            Some("controller::main"),
            "no nodes joined the fleet; nothing to control",
        );
        process::exit(2);
    }
    logger.log(
        LogLevel::Info,
        Some("controller::main"),
        "fleet bootstrap complete",
        Some(json!({"active_nodes": controller.node_count()})),
    );

    let shutdown_hooks = ShutdownHooks::install().unwrap_or_else(|error| {
        eprintln!("failed to install shutdown hooks: {error}");
        process::exit(2);
    });
    logger.info(
        Some("controller::main"),
        "shutdown hooks installed for SIGINT/SIGTERM",
    );

    let mut ticks = 0_u64;
    while !shutdown_hooks.is_triggered() {
        thread::sleep(Duration::from_millis(200));
        ticks += 1;
        // roughly every ten seconds
        if ticks % 50 == 0 {
            if let Ok(payload) = serde_json::to_value(controller.status_report()) {
                logger.log(
                    LogLevel::Info,
                    Some("controller::status"),
                    "fleet status",
                    Some(payload),
                );
            }
        }
    }

    logger.info(
        Some("controller::main"),
        "shutdown signal received, stopping controller",
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
