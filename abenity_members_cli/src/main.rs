//! Abenity 会员 API 命令行工具

use abenity_members_core::{AbenityClient, AbenityConfig, ApiCredentials, KeyPaths, SsoRequest};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "abenity-members")]
#[command(about = "Abenity 会员 API 客户端工具", long_about = None)]
struct Cli {
    /// 使用生产环境（默认沙箱）
    #[arg(long, env = "ABENITY_USE_PRODUCTION")]
    production: bool,

    /// API 用户名
    #[arg(long, env = "ABENITY_API_USERNAME")]
    username: String,

    /// API 密码
    #[arg(long, env = "ABENITY_API_PASSWORD", hide_env_values = true)]
    password: String,

    /// API Key
    #[arg(long, env = "ABENITY_API_KEY", hide_env_values = true)]
    api_key: String,

    /// 调用方 RSA 私钥 PEM 文件
    #[arg(long, env = "ABENITY_PRIVATE_KEY", default_value = "./keys/private.pem")]
    private_key: PathBuf,

    /// Abenity RSA 公钥 PEM 文件
    #[arg(long, env = "ABENITY_PUBLIC_KEY", default_value = "./keys/public.pem")]
    public_key: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// SSO 登录
    Authenticate(MemberArgs),
    /// 停用会员
    Deactivate {
        /// 会员 ID
        #[arg(short, long)]
        user_id: String,
        /// 通知会员
        #[arg(long)]
        notify: bool,
    },
    /// 恢复会员
    Reactivate {
        /// 会员 ID
        #[arg(short, long)]
        user_id: String,
        /// 通知会员
        #[arg(long)]
        notify: bool,
    },
}

#[derive(Args)]
struct MemberArgs {
    /// 会员在本系统内的唯一 ID
    #[arg(long)]
    client_user_id: String,
    /// 会员邮箱
    #[arg(long)]
    email: String,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    zip: Option<String>,
    /// ISO 3166-1 alpha-2 国家代码
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    registration_code: Option<String>,
    /// 发送欢迎邮件
    #[arg(long)]
    send_welcome_email: bool,
    /// 订阅 Spotlight 邮件
    #[arg(long)]
    spotlight: bool,
}

impl From<MemberArgs> for SsoRequest {
    fn from(args: MemberArgs) -> Self {
        SsoRequest {
            client_user_id: args.client_user_id,
            email: args.email,
            username: args.username,
            first_name: args.first_name,
            last_name: args.last_name,
            address: args.address,
            city: args.city,
            state: args.state,
            zip: args.zip,
            country: args.country,
            send_welcome_email: args.send_welcome_email,
            spotlight: args.spotlight,
            password: None,
            registration_code: args.registration_code,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = AbenityConfig {
        use_production: cli.production,
        credentials: ApiCredentials::new(&cli.username, &cli.password, &cli.api_key),
        key_paths: KeyPaths::new(cli.private_key, cli.public_key),
    };
    let client = AbenityClient::new(config)?;
    tracing::debug!("Using {}", client.base_url());

    match cli.command {
        Commands::Authenticate(member) => {
            do_authenticate(&client, member.into()).await?;
        }
        Commands::Deactivate { user_id, notify } => {
            client.deactivate(&user_id, notify).await?;
            println!("会员 {} 已停用", user_id);
        }
        Commands::Reactivate { user_id, notify } => {
            client.reactivate(&user_id, notify).await?;
            println!("会员 {} 已恢复", user_id);
        }
    }

    Ok(())
}

async fn do_authenticate(client: &AbenityClient, request: SsoRequest) -> anyhow::Result<()> {
    println!("正在登录会员: {}", request.client_user_id);

    let response = client.authenticate(&request).await?;

    println!("登录成功!");
    println!("Token: {}", response.token);
    println!("过期时间: {}", response.token_expiration);
    println!("跳转地址: {}", response.token_url);

    Ok(())
}
