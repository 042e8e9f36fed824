use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::{Path, PathBuf};

use query_dispatcher::config::{DashboardConfig, DEFAULT_CONFIG_FILE};
use query_dispatcher::repl::{Command, Session, HELP};

/// 交互式查询分派器：组合过滤条件、提示词并查看生成的请求
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON 配置文件路径
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

fn init_logger(verbose: bool) {
    if std::env::var("RUST_LOG").is_err() {
        if verbose {
            std::env::set_var("RUST_LOG", "debug");
        } else {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    env_logger::init();
}

/// 加载配置，失败时使用默认配置
fn load_config(path: &Path) -> DashboardConfig {
    match DashboardConfig::from_json_file(path) {
        Ok(config) => {
            log::info!("loaded configuration from {}", path.display());
            config
        }
        Err(e) => {
            log::warn!("{}, falling back to built-in configuration", e);
            DashboardConfig::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let config = load_config(&args.config);
    println!("--- Query Dispatcher ---");
    println!("table: {}, page size: {}, top-N: {}", config.table, config.page_size, config.top_n);
    println!("{}", HELP);

    let mut session = Session::new(config);
    let mut editor = DefaultEditor::new()?;

    loop {
        match editor.readline("dispatch> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                editor.add_history_entry(line.as_str())?;

                let command = match Command::parse(&line) {
                    Ok(command) => command,
                    Err(e) => {
                        println!("✗ {}", e);
                        continue;
                    }
                };
                if command == Command::Quit {
                    break;
                }
                match session.execute(command) {
                    Ok(output) => println!("{}", output),
                    Err(e) => println!("✗ {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
