use caman::{
    ArtifactKind, Authority, CertificateOptions, DeleteOptions, InitOptions, KeyOptions,
    RequestOptions, Subject,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join("caman-demo");
    let _ = std::fs::remove_dir_all(&dir);
    let ca = Authority::open(&dir);

    println!("Creating a Root CA in {}...", dir.display());
    let subject = Subject::new("US", "California", "San Francisco", "Example Organization");
    ca.init(&subject, InitOptions::default())?;
    println!("Root CA created!");

    println!("\nCreating a 4096-bit key for api.example.com...");
    ca.keys()
        .create("api.example.com", KeyOptions::default().with_length(4096))?;

    println!("\nCreating a request for api.example.com from the existing key...");
    ca.requests()
        .create("api.example.com", RequestOptions::default())?;

    println!("\nIssuing certificates...");
    for domain in ["api.example.com", "www.example.com"] {
        let issued = ca
            .certificates()
            .create(domain, CertificateOptions::default().with_days(365))?;
        let implicit: Vec<&str> = issued.implicit().iter().map(ArtifactKind::name).collect();
        println!(
            "  {} -> {} (also created: {:?})",
            domain,
            issued.path.display(),
            implicit
        );
    }

    println!("\nCertificates on disk:");
    for domain in ca.certificates().list()? {
        println!("  - {}", domain?);
    }

    println!("\nRemoving www.example.com with its key and request...");
    let removed = ca
        .certificates()
        .delete("www.example.com", DeleteOptions::all())?;
    println!("  removed: {:?}", removed);

    Ok(())
}
