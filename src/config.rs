#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub storage_typ: String,
    pub root_dir: String,
    pub public_url: String,
    pub db_url: String,
    pub bucket: String,
    pub region: String,
    pub s3_endpoint: Option<String>,
    pub jwt_secret: String,
    pub jwt_lifetime_secs: i64,
}
