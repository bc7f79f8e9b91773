//! Records mirroring the on-disk Visual Studio coverage XML
//! (`CoverageDSPriv`) structure:
//!
//!   <CoverageDSPriv>
//!     <Module>
//!       <ModuleName/> <ImageSize/> <ImageLinkTime/> counters...
//!       <NamespaceTable>
//!         counters... <ModuleName/> <NamespaceKeyName/> <NamespaceName/>
//!         <Class>
//!           <ClassKeyName/> <ClassName/> counters... <NamespaceKeyName/>
//!           <Method>
//!             <MethodKeyName/> <MethodName/> <MethodFullName/> counters...
//!             <Lines> <LnStart/> <ColStart/> <LnEnd/> <ColEnd/>
//!                     <Coverage/> <SourceFileID/> <LineID/> </Lines>
//!           </Method>
//!         </Class>
//!       </NamespaceTable>
//!     </Module>
//!     <SourceFileNames> <SourceFileID/> <SourceFileName/> </SourceFileNames>
//!   </CoverageDSPriv>
//!
//! Source file IDs are only unique within the document they came from.
//! Cloning any record deep-copies its children, so merging never touches the
//! records it was given.

use crate::model::CoverageCounts;

/// Coverage state of a single line span, as encoded in `<Coverage>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCoverageState {
    #[default]
    Covered,
    PartiallyCovered,
    NotCovered,
}

impl LineCoverageState {
    pub fn code(self) -> u32 {
        match self {
            LineCoverageState::Covered => 0,
            LineCoverageState::PartiallyCovered => 1,
            LineCoverageState::NotCovered => 2,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(LineCoverageState::Covered),
            1 => Some(LineCoverageState::PartiallyCovered),
            2 => Some(LineCoverageState::NotCovered),
            _ => None,
        }
    }
}

/// Root record of a coverage document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageDocument {
    pub modules: Vec<ModuleRecord>,
    pub source_files: Vec<SourceFileRecord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleRecord {
    pub module_name: Option<String>,
    pub image_size: u32,
    pub image_link_time: u32,
    pub counts: CoverageCounts,
    pub namespaces: Vec<NamespaceRecord>,
}

impl ModuleRecord {
    /// Shift every line's source file ID by `delta`.
    ///
    /// Only meaningful on a clone that is about to be appended to a merged
    /// document whose source file table was shifted by the same amount.
    pub fn offset_source_file_ids(&mut self, delta: u32) {
        for line in self
            .namespaces
            .iter_mut()
            .flat_map(|ns| ns.classes.iter_mut())
            .flat_map(|cls| cls.methods.iter_mut())
            .flat_map(|meth| meth.lines.iter_mut())
        {
            line.source_file_id += delta;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceRecord {
    pub counts: CoverageCounts,
    pub module_name: Option<String>,
    pub namespace_key_name: Option<String>,
    pub namespace_name: Option<String>,
    pub classes: Vec<ClassRecord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassRecord {
    pub class_key_name: Option<String>,
    pub class_name: Option<String>,
    pub counts: CoverageCounts,
    pub namespace_key_name: Option<String>,
    pub methods: Vec<MethodRecord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodRecord {
    pub method_key_name: Option<String>,
    pub method_name: Option<String>,
    pub method_full_name: Option<String>,
    pub counts: CoverageCounts,
    pub lines: Vec<LineRecord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineRecord {
    pub ln_start: u32,
    pub col_start: u32,
    pub ln_end: u32,
    pub col_end: u32,
    pub coverage: LineCoverageState,
    pub source_file_id: u32,
    pub line_id: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceFileRecord {
    pub file_id: u32,
    pub file_name: Option<String>,
}
