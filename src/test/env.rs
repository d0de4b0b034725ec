#[cfg(test)]
mod tests {
    use serial_test::serial;

    // Env loading is tolerant of absent files in both profiles; missing
    // config should never stop the process from booting.

    #[test]
    #[serial]
    fn test_load_environment_with_dev_profile() {
        temp_env::with_var("ROCKET_PROFILE", Some("development"), || {
            assert!(crate::env::load_environment().is_ok());
        });
    }

    #[test]
    #[serial]
    fn test_load_environment_with_production_profile() {
        temp_env::with_var("ROCKET_PROFILE", Some("production"), || {
            assert!(crate::env::load_environment().is_ok());
        });
    }
}
