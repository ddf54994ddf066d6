use clap::{Args, Parser, Subcommand};
use portico_core::claims::{HEALTH_CHECKER, SYSTEM_TTL_SECS};
use portico_core::time::SystemClock;
use portico_core::{Claims, CredentialCodec, NewUser, Role, UserStore};
use portico_db::SqliteStore;
use portico_identity::password::hash_password;

#[derive(Parser)]
#[command(name = "portico")]
#[command(about = "Portico local administrative CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User accounts in the identity store
    User {
        #[command(flatten)]
        store: StoreArgs,
        #[command(subcommand)]
        sub: UserCommands,
    },
    /// Mint or inspect credentials
    Token {
        #[command(flatten)]
        secret: SecretArg,
        #[command(subcommand)]
        sub: TokenCommands,
    },
}

#[derive(Args)]
struct StoreArgs {
    #[arg(long, env = "DATABASE_URL", default_value = "identity.db")]
    db: String,
}

#[derive(Args)]
struct SecretArg {
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user directly, with any named role
    Add {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "USER")]
        role: String,
    },
    /// Change a user's role
    AssignRole {
        #[arg(long)]
        username: String,
        #[arg(long)]
        role: String,
    },
    /// List all users
    List,
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Print a long-lived SYSTEM credential
    System {
        #[arg(long, default_value = HEALTH_CHECKER)]
        principal: String,
        #[arg(long, default_value_t = SYSTEM_TTL_SECS)]
        ttl_secs: i64,
    },
    /// Verify a credential and print its claims
    Inspect { token: String },
}

fn parse_role(raw: &str) -> Result<Role, Box<dyn std::error::Error>> {
    let role = Role::from(raw.to_ascii_uppercase());
    if !role.is_recognized() {
        let names: Vec<String> = Role::NAMED.iter().map(|r| r.as_str().to_string()).collect();
        return Err(format!("Invalid role. Use one of {}.", names.join(", ")).into());
    }
    Ok(role)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::User { store, sub } => {
            let db = SqliteStore::open(&store.db)?;
            let users: &dyn UserStore = &db;
            match sub {
                UserCommands::Add { username, email, password, role } => {
                    let new_user = NewUser {
                        username,
                        email,
                        password_hash: hash_password(&password).map_err(|e| e.to_string())?,
                        role: parse_role(&role)?,
                    };
                    let user = users.create_user(&new_user, portico_core::time::now_secs())?;
                    println!("User created: {} (id {}, role {})", user.username, user.id, user.role);
                }
                UserCommands::AssignRole { username, role } => {
                    let role = parse_role(&role)?;
                    users.set_role(&username, &role)?;
                    println!("Role {} assigned to user: {}", role, username);
                }
                UserCommands::List => {
                    println!("{:<6} {:<20} {:<30} {:<10}", "ID", "Username", "Email", "Role");
                    println!("{}", "-".repeat(70));
                    for user in users.list_users()? {
                        println!("{:<6} {:<20} {:<30} {:<10}", user.id, user.username, user.email, user.role);
                    }
                }
            }
        }
        Commands::Token { secret, sub } => {
            let codec = CredentialCodec::new(secret.jwt_secret.as_bytes())?;
            match sub {
                TokenCommands::System { principal, ttl_secs } => {
                    let claims = Claims::for_system(principal, ttl_secs, &SystemClock);
                    println!("{}", codec.issue(&claims)?);
                }
                TokenCommands::Inspect { token } => {
                    let claims = codec.verify(&token)?;
                    println!("{}", serde_json::to_string_pretty(&claims)?);
                }
            }
        }
    }

    Ok(())
}
