// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Field Lines
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
pub mod metadata;
pub mod record;
pub mod selection;
pub mod store;

pub use record::Direction;
pub use selection::{parse_selection, Selection, SelectionExpr};
pub use store::{FieldLineData, FieldLineStore, ReadParameters, SurfaceRequest};
