#![forbid(unsafe_code)]

//! Sigtuna CLI — XML Digital Signature operations (sign, verify).

use clap::{Parser, Subcommand};
use sigtuna_core::{algorithm, Error};
use sigtuna_dsig::{DsigContext, Reference, SignedInfo, SignedXml};
use sigtuna_keys::{Key, KeyInfo, KeyValue, X509Data};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    name = "sigtuna",
    about = "Sigtuna — Pure Rust XML Digital Signatures (XML-DSig, C14N)",
    version
)]
struct Cli {
    /// Verbose output (debug-level tracing)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a signed XML document
    Verify {
        /// Input XML file
        file: PathBuf,

        /// Load private/public key (PEM or DER, auto-detected)
        #[arg(short = 'k', long)]
        key: Option<PathBuf>,

        /// Load X.509 certificate (PEM or DER)
        #[arg(long)]
        cert: Option<PathBuf>,

        /// Load raw HMAC key (binary file)
        #[arg(long = "hmac-key")]
        hmac_key: Option<PathBuf>,

        /// Register additional ID attribute names
        #[arg(long = "id-attr")]
        id_attr: Vec<String>,

        /// Map an external reference URI to a local file (URI=FILE)
        #[arg(long = "url-map")]
        url_map: Vec<String>,
    },

    /// Sign an XML document with an enveloped signature
    Sign {
        /// Input XML file
        file: PathBuf,

        /// Load private key (PEM or DER)
        #[arg(short = 'k', long)]
        key: Option<PathBuf>,

        /// Load raw HMAC key (binary file)
        #[arg(long = "hmac-key")]
        hmac_key: Option<PathBuf>,

        /// Signature method URI
        #[arg(long, default_value = algorithm::RSA_SHA256)]
        method: String,

        /// Digest method URI
        #[arg(long, default_value = algorithm::SHA256)]
        digest: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Register additional ID attribute names
        #[arg(long = "id-attr")]
        id_attr: Vec<String>,
    },

    /// List supported algorithms and key types
    Info,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Verify {
            file,
            key,
            cert,
            hmac_key,
            id_attr,
            url_map,
        } => cmd_verify(file, key, cert, hmac_key, id_attr, url_map),

        Commands::Sign {
            file,
            key,
            hmac_key,
            method,
            digest,
            output,
            id_attr,
        } => cmd_sign(file, key, hmac_key, method, digest, output, id_attr),

        Commands::Info => cmd_info(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn cmd_verify(
    file: PathBuf,
    key: Option<PathBuf>,
    cert: Option<PathBuf>,
    hmac_key: Option<PathBuf>,
    id_attr: Vec<String>,
    url_map: Vec<String>,
) -> Result<(), Error> {
    let xml = read_file(&file)?;
    let key = load_key(key.or(cert), hmac_key)?;

    let mut ctx = DsigContext::new();
    for attr in &id_attr {
        ctx.add_id_attr(attr);
    }
    for spec in &url_map {
        let (uri, path) = spec.split_once('=').ok_or_else(|| {
            Error::MissingArgument(format!("invalid url-map format: {spec} (expected URI=FILE)"))
        })?;
        ctx.add_url_map(uri, path);
    }

    let signed = SignedXml::load(&xml)?;
    signed.verify(&ctx, key.as_ref())?;
    println!("OK");
    Ok(())
}

fn cmd_sign(
    file: PathBuf,
    key: Option<PathBuf>,
    hmac_key: Option<PathBuf>,
    method: String,
    digest: String,
    output: Option<PathBuf>,
    id_attr: Vec<String>,
) -> Result<(), Error> {
    let xml = read_file(&file)?;
    let key = load_key(key, hmac_key)?
        .ok_or_else(|| Error::MissingArgument("a signing key (--key or --hmac-key)".into()))?;
    if !key.has_private() {
        return Err(Error::Key("signing requires a private key".into()));
    }

    let mut ctx = DsigContext::new();
    for attr in &id_attr {
        ctx.add_id_attr(attr);
    }

    let mut signed_info = SignedInfo::new();
    signed_info.set_signature_method(&method);
    let mut reference = Reference::new(Some(String::new()), &digest);
    reference.add_transform(algorithm::ENVELOPED_SIGNATURE);
    reference.add_transform(algorithm::EXC_C14N);
    signed_info.add_reference(reference);

    let mut signed = SignedXml::new(signed_info);
    if let Some(key_info) = build_key_info(&key) {
        signed.set_key_info(key_info);
    }

    let doc = signed.sign_enveloped(&ctx, &key, &xml)?;
    write_output(output, doc.to_xml_string().as_bytes())
}

fn cmd_info() -> Result<(), Error> {
    println!("Sigtuna — Pure Rust XML Digital Signatures");
    println!();
    println!("Supported digest algorithms:");
    println!("  SHA-1, SHA-224, SHA-256, SHA-384, SHA-512");
    println!("  SHA3-224, SHA3-256, SHA3-384, SHA3-512");
    println!();
    println!("Supported signature algorithms:");
    println!("  RSA PKCS#1 v1.5 (SHA-1, SHA-224, SHA-256, SHA-384, SHA-512)");
    println!("  RSA-PSS (SHA-1, SHA-224, SHA-256, SHA-384, SHA-512)");
    println!("  DSA (SHA-1, SHA-256)");
    println!("  ECDSA P-256/P-384 (SHA-1, SHA-256, SHA-384, SHA-512)");
    println!("  HMAC (SHA-1, SHA-224, SHA-256, SHA-384, SHA-512)");
    println!();
    println!("Supported canonicalization:");
    println!("  C14N 1.0 (±comments)");
    println!("  Exclusive C14N 1.0 (±comments)");
    println!();
    println!("Supported transforms:");
    println!("  enveloped-signature, base64, canonicalization");
    println!();
    println!("Supported key formats:");
    println!("  PEM, DER (RSA, EC P-256/P-384, X.509), raw binary (HMAC)");
    Ok(())
}

// ── Utility functions ────────────────────────────────────────────────

fn read_file(path: &PathBuf) -> Result<String, Error> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::Io(std::io::Error::new(e.kind(), format!("{}: {e}", path.display()))))
}

fn write_output(path: Option<PathBuf>, data: &[u8]) -> Result<(), Error> {
    match path {
        Some(p) => std::fs::write(&p, data)
            .map_err(|e| Error::Io(std::io::Error::new(e.kind(), format!("{}: {e}", p.display())))),
        None => {
            use std::io::Write;
            std::io::stdout().write_all(data).map_err(Error::Io)
        }
    }
}

fn load_key(key_path: Option<PathBuf>, hmac_key_path: Option<PathBuf>) -> Result<Option<Key>, Error> {
    if let Some(path) = key_path {
        return Ok(Some(sigtuna_keys::loader::load_key_file(&path)?));
    }
    if let Some(path) = hmac_key_path {
        let bytes = std::fs::read(&path).map_err(|e| {
            Error::Io(std::io::Error::new(e.kind(), format!("{}: {e}", path.display())))
        })?;
        return Ok(Some(sigtuna_keys::loader::load_hmac_key(&bytes)));
    }
    Ok(None)
}

/// KeyInfo advertising the verification key: the certificate chain when the
/// key came from one, otherwise an inline KeyValue.  HMAC keys advertise
/// nothing.
fn build_key_info(key: &Key) -> Option<KeyInfo> {
    let mut key_info = KeyInfo::new();
    if !key.x509_chain.is_empty() {
        let mut x509 = X509Data::new();
        for cert in &key.x509_chain {
            x509.add_certificate(cert).ok()?;
        }
        key_info.add_x509_data(x509);
        return Some(key_info);
    }
    let value = KeyValue::from_key(key)?;
    key_info.add_key_value(value);
    Some(key_info)
}
