use super::Host;
use crate::Result;
use crate::eval::{EnvOptions, Environment};
use crate::server::{self, ServerConfig};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use core::net::IpAddr;
use std::io::Write;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on [default: 8080]
    #[arg(long, short = 'p', value_name = "PORT", env = "CEL_EVAL_PORT")]
    pub port: Option<u16>,

    /// Address to listen on [default: 0.0.0.0]
    #[arg(long, value_name = "ADDRESS", env = "CEL_EVAL_ADDRESS")]
    pub address: Option<IpAddr>,

    /// Path to configuration file (default is `cel-eval.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,
}

/// Loads the server configuration, letting command-line flags override file values.
fn resolve_config(base_dir: &Utf8Path, args: &ServeArgs) -> Result<ServerConfig> {
    let mut config = ServerConfig::load(base_dir, args.config.as_deref())?;

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(address) = args.address {
        config.address = address;
    }

    Ok(config)
}

async fn serve_inner(args: &ServeArgs) -> Result<()> {
    let config = resolve_config(Utf8Path::new("."), args)?;
    let env = Environment::new(EnvOptions::default())?;
    server::serve(&config, env).await
}

/// Serves evaluation requests over HTTP until the server fails.
pub async fn serve_requests<H: Host>(host: &mut H, args: &ServeArgs) -> Result<()> {
    match serve_inner(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = writeln!(host.error(), "{e}");
            host.exit(1);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn base_dir(contents: Option<&str>) -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("temp path should be UTF-8");
        if let Some(contents) = contents {
            fs::write(path.join(server::DEFAULT_CONFIG_FILE), contents).unwrap();
        }
        (dir, path)
    }

    #[test]
    fn test_flags_override_file() {
        let (_dir, base) = base_dir(Some("port = 9000\naddress = \"127.0.0.1\"\n"));
        let args = ServeArgs {
            port: Some(9100),
            address: None,
            config: None,
        };

        let config = resolve_config(&base, &args).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9100");
    }

    #[test]
    fn test_defaults() {
        let (_dir, base) = base_dir(None);
        let args = ServeArgs {
            port: None,
            address: None,
            config: None,
        };

        assert_eq!(resolve_config(&base, &args).unwrap(), ServerConfig::default());
    }
}
