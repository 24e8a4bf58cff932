use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub(crate) struct Args {
    /// Service listening host
    #[arg(long, env = "IMAGEHUB_HOST", default_value = "127.0.0.1")]
    pub(crate) host: String,

    /// Service listening port
    #[arg(short, long, env = "IMAGEHUB_PORT", default_value_t = 5000)]
    pub(crate) port: u16,

    /// Object storage backend type
    #[arg(short, long, env = "IMAGEHUB_STORAGE", default_value = "S3")]
    pub(crate) storage: String,

    /// Root directory for the filesystem backend
    #[arg(long, env = "IMAGEHUB_ROOTDIR", default_value = "/var/lib/imagehub")]
    pub(crate) root: String,

    /// Public base url
    #[arg(
        long,
        env = "IMAGEHUB_PUBLIC_URL",
        default_value = "http://127.0.0.1:5000"
    )]
    pub(crate) url: String,

    /// Database url
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:imagehub.db?mode=rwc"
    )]
    pub(crate) database_url: String,

    /// S3 bucket name
    #[arg(long, env = "AWS_S3_BUCKET", default_value = "imagehub")]
    pub(crate) bucket: String,

    /// S3 region
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub(crate) region: String,

    /// Custom S3 endpoint for S3-compatible stores
    #[arg(long, env = "AWS_S3_ENDPOINT")]
    pub(crate) s3_endpoint: Option<String>,
}
