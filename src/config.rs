use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub server_host: String,
    pub server_port: u16,
    pub billplz_api_key: String,
    pub billplz_collection_id: String,
    pub billplz_base_url: String,
    pub payment_callback_url: String,
    pub payment_redirect_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("JWT_EXPIRATION_HOURS must be a number"),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            billplz_api_key: env::var("BILLPLZ_API_KEY")
                .expect("BILLPLZ_API_KEY must be set"),
            billplz_collection_id: env::var("BILLPLZ_COLLECTION_ID")
                .expect("BILLPLZ_COLLECTION_ID must be set"),
            billplz_base_url: env::var("BILLPLZ_BASE_URL")
                .unwrap_or_else(|_| "https://www.billplz.com/api/v3".to_string()),
            payment_callback_url: env::var("PAYMENT_CALLBACK_URL")
                .expect("PAYMENT_CALLBACK_URL must be set"),
            payment_redirect_url: env::var("PAYMENT_REDIRECT_URL")
                .expect("PAYMENT_REDIRECT_URL must be set"),
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
