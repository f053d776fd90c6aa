//! Test fixtures and constants.

/// Passphrase handed to the binary through the environment.
pub const PASSPHRASE: &str = "correct horse battery staple";

/// Config with an encrypted file store, two generators and two jobs.
///
/// Low PBKDF2 iterations and a single retry attempt keep the tests fast.
pub const CONFIG_WITH_JOBS: &str = r#"
[encryption]
enabled = true
key_file = "config/.master.key"

[backup]
enabled = true
dir = "data/backup"
encrypt = true
retention_days = 30

[recovery]
backup_dir = "config/key_backups"
iterations = 1000

[retry]
max_attempts = 1

[[stores]]
name = "primary"
kind = "file"
path = "data/secrets.json"

[[generators]]
name = "strong"
kind = "password"
length = 24

[[generators]]
name = "service_key"
kind = "api_key"
prefix = "sk_live_"

[[jobs]]
name = "database"
store = "primary"
generator = "strong"
secret_id = "db_password"

[[jobs]]
name = "payments"
store = "primary"
generator = "service_key"
secret_id = "payments_api_key"
"#;

/// Job whose store does not exist; appended to [`CONFIG_WITH_JOBS`].
pub const BROKEN_JOB: &str = r#"
[[jobs]]
name = "orphan"
store = "vault"
generator = "strong"
secret_id = "orphan_secret"
"#;
