use tollgate_api::config::Settings;

pub fn check_config(settings: &Settings) -> anyhow::Result<()> {
    let service = super::service(settings);

    let identifiers = service.identifiers()?;
    let authenticators = service.authenticators()?;

    println!(
        "Identifiers:    {}",
        identifiers.names().collect::<Vec<_>>().join(", ")
    );
    println!(
        "Authenticators: {}",
        authenticators.names().collect::<Vec<_>>().join(", ")
    );
    println!("Completion key: {}", settings.completion_key());
    if let Some(redirect) = &settings.mfa.unauthenticated_redirect {
        println!("Redirect:       {redirect}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_build() {
        assert!(check_config(&Settings::default()).is_ok());
    }

    #[test]
    fn unknown_authenticator_is_reported() {
        let settings = Settings::from_toml(
            r#"
            [[mfa.authenticators]]
            name = "Sms"
            "#,
        )
        .unwrap();

        let err = check_config(&settings).unwrap_err();
        assert!(err.to_string().contains("Sms"));
    }
}
