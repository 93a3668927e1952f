use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: IpAddr,
    pub server_port: u16,
    pub environment: Environment,
    pub log_level: String,
    pub jwt_secret: String,
    pub jwt_access_expiration_secs: u64,
    pub frontend_url: String,
    /// Absent key means cards are produced by the offline placeholder provider.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub rules: GameRules,
}

/// Deployment environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Tunables of the round engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRules {
    pub min_players: usize,
    pub max_players: usize,
    pub initial_hand_size: usize,
    /// Points by winner rank; ranks past the end of the table score nothing.
    pub placement_points: Vec<i32>,
    pub default_total_rounds: i32,
    pub max_total_rounds: i32,
    pub response_batch_size: usize,
    pub theme_batch_size: usize,
    pub top_up_threshold: usize,
    pub top_up_batch_size: usize,
    pub room_expiration: Duration,
    pub sweep_interval: Duration,
    /// How long a player with no open connection keeps their seat.
    pub reconnect_grace: Duration,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            min_players: 3,
            max_players: 8,
            initial_hand_size: 7,
            placement_points: vec![3, 2, 1],
            default_total_rounds: 10,
            max_total_rounds: 50,
            response_batch_size: 100,
            theme_batch_size: 40,
            top_up_threshold: 20,
            top_up_batch_size: 50,
            room_expiration: Duration::from_secs(180 * 60),
            sweep_interval: Duration::from_secs(300),
            reconnect_grace: Duration::from_secs(15),
        }
    }
}

impl GameRules {
    /// Load the rules from environment variables, falling back to [`GameRules::default`].
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed, or if the resulting rules
    /// fail [`GameRules::validate`].
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let placement_points = match std::env::var("PLACEMENT_POINTS") {
            Ok(raw) => parse_points(&raw)?,
            Err(_) => defaults.placement_points,
        };

        let rules = Self {
            min_players: env_or("MIN_PLAYERS", defaults.min_players)?,
            max_players: env_or("MAX_PLAYERS", defaults.max_players)?,
            initial_hand_size: env_or("INITIAL_HAND_SIZE", defaults.initial_hand_size)?,
            placement_points,
            default_total_rounds: env_or("DEFAULT_TOTAL_ROUNDS", defaults.default_total_rounds)?,
            max_total_rounds: env_or("MAX_TOTAL_ROUNDS", defaults.max_total_rounds)?,
            response_batch_size: env_or("RESPONSE_BATCH_SIZE", defaults.response_batch_size)?,
            theme_batch_size: env_or("THEME_BATCH_SIZE", defaults.theme_batch_size)?,
            top_up_threshold: env_or("TOP_UP_THRESHOLD", defaults.top_up_threshold)?,
            top_up_batch_size: env_or("TOP_UP_BATCH_SIZE", defaults.top_up_batch_size)?,
            room_expiration: Duration::from_secs(env_or::<u64>("ROOM_EXPIRATION_MINUTES", 180)? * 60),
            sweep_interval: Duration::from_secs(env_or("SWEEP_INTERVAL_SECS", 300)?),
            reconnect_grace: Duration::from_secs(env_or("RECONNECT_GRACE_SECS", 15)?),
        };
        rules.validate()?;
        Ok(rules)
    }

    /// Check that the rules describe a playable game.
    ///
    /// A round needs a theme master plus at least one player, so fewer than two players can
    /// never leave `CardPlaying`.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending rule.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_players < 2 {
            anyhow::bail!("MIN_PLAYERS must be at least 2");
        }
        if self.max_players < self.min_players {
            anyhow::bail!("MAX_PLAYERS must not be lower than MIN_PLAYERS");
        }
        if self.initial_hand_size == 0 {
            anyhow::bail!("INITIAL_HAND_SIZE must be at least 1");
        }
        if self.response_batch_size == 0
            || self.theme_batch_size == 0
            || self.top_up_batch_size == 0
        {
            anyhow::bail!("Card batch sizes must be greater than zero");
        }
        if self.default_total_rounds < 1 || self.max_total_rounds < 1 {
            anyhow::bail!("Round counts must be at least 1");
        }
        if self.sweep_interval.is_zero() {
            anyhow::bail!("SWEEP_INTERVAL_SECS must be greater than zero");
        }
        Ok(())
    }

    /// Points awarded to the winner at `rank` (0-based).
    #[must_use]
    pub fn points_for_rank(&self, rank: usize) -> i32 {
        self.placement_points.get(rank).copied().unwrap_or(0)
    }

    /// Clamp a requested round count into `1..=max_total_rounds`.
    #[must_use]
    pub fn clamp_rounds(&self, requested: i32) -> i32 {
        requested.clamp(1, self.max_total_rounds.max(1))
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required: `DATABASE_URL`, `JWT_SECRET`
    /// Optional with defaults: `SERVER_HOST`, `SERVER_PORT`, `ENVIRONMENT`, `LOG_LEVEL`,
    /// `FRONTEND_URL`, `GEMINI_API_KEY`, `GEMINI_MODEL` and the game rules.
    ///
    /// On Railway, `PORT` overrides `SERVER_PORT` and host defaults to `0.0.0.0`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is not set, or if any value is malformed.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let jwt_secret =
            std::env::var("JWT_SECRET").map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?;

        let environment = match std::env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .as_str()
        {
            "production" => Environment::Production,
            "staging" => Environment::Staging,
            _ => Environment::Development,
        };

        // Railway provides PORT; fall back to SERVER_PORT, then 3000
        let server_port = std::env::var("PORT")
            .or_else(|_| std::env::var("SERVER_PORT"))
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| anyhow::anyhow!("SERVER_PORT / PORT must be a valid u16"))?;

        // In production, default to 0.0.0.0 so Railway can route traffic
        let default_host = if environment == Environment::Production {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        };

        let server_host = std::env::var("SERVER_HOST")
            .unwrap_or_else(|_| default_host.to_string())
            .parse::<IpAddr>()
            .map_err(|_| anyhow::anyhow!("SERVER_HOST must be a valid IP address"))?;

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        Ok(Self {
            database_url,
            server_host,
            server_port,
            environment,
            log_level,
            jwt_secret,
            jwt_access_expiration_secs: env_or("JWT_ACCESS_EXPIRATION_SECS", 86_400)?,
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
            gemini_api_key,
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            rules: GameRules::from_env()?,
        })
    }

    /// Build the socket address for the server to bind to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server_host, self.server_port)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

/// Parse a comma separated point table such as `"3,2,1"`.
fn parse_points(raw: &str) -> anyhow::Result<Vec<i32>> {
    let points = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i32>()
                .ok()
                .filter(|p| *p >= 0)
                .ok_or_else(|| anyhow::anyhow!("PLACEMENT_POINTS has an invalid entry: {part}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    if points.is_empty() {
        anyhow::bail!("PLACEMENT_POINTS must list at least one value");
    }
    Ok(points)
}
