//! Prints an argon2 hash for seeding or resetting `usuarios.password` by hand.
//!
//! Usage: `hashpass <password> [correo]`

use std::process::ExitCode;

use orthomas_server::auth::{hash_password, validate_new_password};

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(password) = args.next() else {
        eprintln!("Usage: hashpass <password> [correo]");
        return ExitCode::from(2);
    };

    if let Err(e) = validate_new_password(&password) {
        eprintln!("warning: {e}");
    }

    let phc = match hash_password(&password) {
        Ok(phc) => phc,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    println!("{phc}");
    if let Some(correo) = args.next() {
        println!(
            "UPDATE usuarios SET password = '{phc}' WHERE correo = '{}';",
            correo.replace('\'', "''")
        );
    }
    ExitCode::SUCCESS
}
