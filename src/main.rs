use bili_info::{
    BiliClient, Result,
    config::{AppConfig, Cli, Command},
};
use clap::Parser;
use log::{debug, error, info};
use serde::Serialize;

fn init_logger(cli: &Cli) {
    if cli.quiet {
        // 如果是安静模式，只显示错误
        let _ = env_logger::Builder::new()
            .filter_level(log::LevelFilter::Error)
            .try_init();
        return;
    }

    // 根据详细程度设置日志级别
    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {}] {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .try_init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(&cli)?;
    debug!(
        "配置已加载: config_file={:?}, timeout={:?}",
        config.config_file, config.client.timeout
    );
    let client = BiliClient::new(config.client)?;

    match cli.command {
        Command::Resolve { url } => print_json(&client.resolve_identifier(&url).await?),
        Command::Subtitles { url, lang, all } => {
            print_json(&client.get_subtitles(&url, lang.as_deref(), all).await?)
        }
        Command::Danmaku { url } => print_json(&client.get_danmaku(&url).await?),
        Command::Comments { url } => print_json(&client.get_comments(&url).await?),
        Command::Search(args) => print_json(&client.search(&args.into()).await?),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(&cli);
    info!("应用启动");

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("错误: {}", e);
        std::process::exit(1);
    }
}
