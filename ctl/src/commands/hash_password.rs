use clap::Parser;
use tollgate_db::{BcryptHasher, PasswordHasher};

#[derive(Clone, Parser)]
pub struct HashPasswordParams {
    #[clap(short, long)]
    pub password: String,

    /// bcrypt cost factor.
    #[clap(short, long, default_value_t = 12)]
    pub cost: u32,
}

pub fn hash_password(HashPasswordParams { password, cost }: HashPasswordParams) -> anyhow::Result<()> {
    let hasher = BcryptHasher::new(cost)?;
    println!("{}", hasher.hash(&password)?);

    Ok(())
}
