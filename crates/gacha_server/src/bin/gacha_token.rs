//! Issues a development credential signed with the server's key.
//!
//! ```bash
//! gacha_token <user_id> [config.toml]
//! curl -H "x-token: $(gacha_token alice)" localhost:8080/user/balance
//! ```

use std::process::ExitCode;

use gacha_server::{config_path, GachaConfig};

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(user_id) = args.next() else {
        eprintln!("usage: gacha_token <user_id> [config.toml]");
        return ExitCode::from(2);
    };

    let issued = GachaConfig::load(config_path(args.next())).and_then(|config| {
        let auth = config.auth.authenticator()?;
        Ok(auth.issue(&user_id, config.auth.token_ttl_secs))
    });

    match issued {
        Ok(Ok(credential)) => {
            println!("{credential}");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            eprintln!("cannot issue a credential for {user_id:?}: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
