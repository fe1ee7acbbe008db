//! Domain models: projects, panels, activities and FAT protocols.

pub mod project;
pub mod protocol;

pub use project::{
    Activity, NewProject, PanelStub, Project, ProjectStatus, ORPHAN_OWNER,
};
pub use protocol::{
    derive_status, Aislamiento, ChecklistItem, ChecklistSection, Firma, ItemAnswer,
    MedicionAislamiento, Protocol, ProtocolStatus, Seccion, SignerRole,
};
