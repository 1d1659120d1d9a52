//! Build script para generar recursos de Windows

fn main() {
    // Solo generar recursos cuando el destino es Windows
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("windows") {
        let mut res = winres::WindowsResource::new();

        // Información del producto
        res.set("ProductName", "Hachiware")
            .set("FileDescription", "Mascota que sigue al cursor")
            .set("CompanyName", "Néstor")
            .set("LegalCopyright", "Copyright © 2024-2025 Néstor")
            .set("OriginalFilename", "hachiware-overlay.exe");

        // Versión del archivo y del producto (leer de Cargo.toml)
        let version = env!("CARGO_PKG_VERSION");
        res.set("ProductVersion", version)
            .set("FileVersion", version);

        if let Err(e) = res.compile() {
            eprintln!("Error compilando recursos de Windows: {}", e);
        }
    }
}
