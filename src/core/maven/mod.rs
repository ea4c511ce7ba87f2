mod artifact;

pub use artifact::MavenArtifact;

/// Well-known Maven repositories used by the game ecosystem.
pub const MOJANG_LIBRARIES: &str = "https://libraries.minecraft.net";
pub const FORGE_MAVEN: &str = "https://maven.minecraftforge.net";
