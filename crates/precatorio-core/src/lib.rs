pub mod cnj;
pub mod parse;
pub mod record;
pub mod schema;

pub use cnj::{format_cnj, normalize_numbers};
pub use record::{
    AttorneyRecord, BarRegistrationRecord, CaseRecord, ClaimValueRecord, CoverSheetRecord,
    HearingRecord, OriginUnit, PartyRecord, RelatedCaseRecord, SourceRecord, StateRef,
    SupplementaryInfoRecord,
};
