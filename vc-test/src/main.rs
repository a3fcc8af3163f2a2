use vcdm_codec::{Credential, DecodeOptions, Error, Presentation};

fn usage() {
    eprintln!(
        "Usage: vcdm-codec-test [-v] [--strict] [--jwt-decode] <generate|generate-presentation> <file>"
    );
}

struct Flags {
    strict: bool,
    jwt_decode: bool,
}

impl Flags {
    fn options(&self) -> DecodeOptions {
        let options = DecodeOptions::default().with_disabled_proof_check();
        if self.strict {
            options.with_strict_validation()
        } else {
            options
        }
    }
}

fn generate(data: &[u8], flags: &Flags) -> Result<String, Error> {
    let vc = if flags.strict {
        Credential::decode(data, &flags.options())?
    } else {
        Credential::decode_unverified(data)?
    };
    if !vc.type_.contains(&"VerifiableCredential".to_string()) {
        return Err(Error::UnsupportedCredentialFormat);
    }
    if flags.jwt_decode {
        log::debug!("decoded token credential {:?}", vc.id);
    }
    Ok(serde_json::to_string_pretty(&vc)?)
}

fn generate_presentation(data: &[u8], flags: &Flags) -> Result<String, Error> {
    let vp = if flags.strict {
        Presentation::decode(data, &flags.options())?
    } else {
        Presentation::decode_unverified(data)?
    };
    log::debug!("presentation carries {} credentials", vp.credentials().len());
    Ok(serde_json::to_string_pretty(&vp)?)
}

fn write_out(data: String) {
    use std::io::Write;
    let stdout = std::io::stdout();
    if let Err(e) = stdout.lock().write_all(data.as_bytes()) {
        eprintln!("Unable to write output: {}", e);
        std::process::exit(1);
    }
}

fn main() {
    let mut cmd: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut verbosity = 0;
    let mut flags = Flags {
        strict: false,
        jwt_decode: false,
    };
    for arg in std::env::args().skip(1) {
        match (arg.starts_with('-'), arg.as_ref()) {
            (true, "--strict") => flags.strict = true,
            (true, "--jwt-decode") => flags.jwt_decode = true,
            (true, "-v") => verbosity += 1,
            (true, _) => {
                eprintln!("Unexpected option '{}'", arg);
                return usage();
            }
            (false, _) => {
                if cmd.is_none() {
                    cmd = Some(arg);
                } else if filename.is_none() {
                    filename = Some(arg);
                } else {
                    eprintln!("Unexpected argument '{}'", arg);
                    return usage();
                }
            }
        }
    }
    let (cmd, filename) = match (cmd, filename) {
        (Some(cmd), Some(filename)) => (cmd, filename),
        _ => return usage(),
    };

    if let Err(e) = stderrlog::new()
        .module(module_path!())
        .module("vcdm_codec")
        .verbosity(verbosity + 1)
        .init()
    {
        eprintln!("Unable to initialize logging: {}", e);
    }

    let data = match std::fs::read(&filename) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Unable to read {}: {}", filename, e);
            std::process::exit(1);
        }
    };
    // the test suite hands tokens over with a trailing newline
    let data = if flags.jwt_decode {
        String::from_utf8_lossy(&data).trim().as_bytes().to_vec()
    } else {
        data
    };

    let output = match cmd.as_ref() {
        "generate" => generate(&data, &flags),
        "generate-presentation" => generate_presentation(&data, &flags),
        _ => {
            eprintln!("Unexpected command '{}'", cmd);
            std::process::exit(1);
        }
    };
    match output {
        Ok(output) => write_out(output),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
