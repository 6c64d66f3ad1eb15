use crate::layout::DEFAULT_ROWS_PER_PAGE;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Web server settings. Every flag can also come from the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "sheetgrid-web", about = "Spreadsheet grid editor and PDF exporter")]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "SHEETGRID_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "SHEETGRID_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Directory holding uploaded spreadsheets
    #[arg(long, env = "SHEETGRID_UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Directory served under /static
    #[arg(long, env = "SHEETGRID_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Data rows per exported PDF page
    #[arg(
        long,
        env = "SHEETGRID_ROWS_PER_PAGE",
        default_value_t = DEFAULT_ROWS_PER_PAGE,
        value_parser = parse_rows_per_page
    )]
    pub rows_per_page: usize,

    /// Upload size limit in megabytes
    #[arg(long, env = "SHEETGRID_MAX_UPLOAD_MB", default_value_t = 10)]
    pub max_upload_mb: usize,
}

fn parse_rows_per_page(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            upload_dir: PathBuf::from("uploads"),
            static_dir: PathBuf::from("static"),
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
            max_upload_mb: 10,
        }
    }
}
