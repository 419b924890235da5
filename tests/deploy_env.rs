use std::path::PathBuf;

use siteforge::config::DeploySection;
use siteforge::deploy::{
    run_deploy, DeployCredentials, ENV_PASSWORD, ENV_REMOTE_PATH, ENV_USERNAME,
};
use siteforge::errors::TaskError;

// Environment manipulation is process-global, so everything lives in a single
// test function to avoid races with the parallel test runner.
#[tokio::test]
async fn missing_credentials_fail_fast_without_connecting() {
    unsafe {
        std::env::remove_var(ENV_USERNAME);
        std::env::remove_var(ENV_PASSWORD);
        std::env::remove_var(ENV_REMOTE_PATH);
    }

    let err = DeployCredentials::from_env().expect_err("credentials must be required");
    assert!(matches!(err, TaskError::Configuration(_)));
    assert!(
        err.to_string().contains(ENV_USERNAME),
        "error should name the missing variable, got: {err}"
    );

    // With only the username set, the next missing variable is reported.
    unsafe {
        std::env::set_var(ENV_USERNAME, "deployer");
    }
    let err = DeployCredentials::from_env().expect_err("password still missing");
    assert!(err.to_string().contains(ENV_PASSWORD), "got: {err}");

    // A blank value counts as unset.
    unsafe {
        std::env::set_var(ENV_PASSWORD, "   ");
    }
    let err = DeployCredentials::from_env().expect_err("blank password is not a credential");
    assert!(err.to_string().contains(ENV_PASSWORD), "got: {err}");

    unsafe {
        std::env::remove_var(ENV_USERNAME);
        std::env::remove_var(ENV_PASSWORD);
    }

    // The full deploy entry point takes the same early exit: the host below
    // does not exist, so any connection attempt would surface as a
    // `Connection` error instead of `Configuration`.
    let section = DeploySection {
        host: "ftp.invalid".to_string(),
        port: 21,
        secure: false,
        globs: vec!["build/**".to_string()],
    };
    let err = run_deploy(PathBuf::from("."), section)
        .await
        .expect_err("deploy without credentials must fail");
    assert!(
        matches!(err, TaskError::Configuration(_)),
        "expected a configuration error, got: {err}"
    );
}
