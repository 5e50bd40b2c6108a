use super::code::{FunctionBuilder, FunctionDefinition, Signature};
use super::data::DataSegmentBuilder;
use super::export::ExportBuilder;
use super::global::GlobalBuilder;
use super::import::ImportBuilder;
use super::invoke::{Identity, Invoke};
use super::memory::MemoryBuilder;
use super::table::{TableBuilder, TableDefinition};
use crate::elements::{
    CodeSection, DataSection, DataSegment, ElementSection, ElementSegment, ExportEntry,
    ExportSection, Func, FunctionSection, FunctionType, GlobalEntry, GlobalSection, ImportEntry,
    ImportSection, InitExpr, Instruction, MemorySection, MemoryType, Module, Section,
    StartSection, TableSection, Type, TypeSection,
};
use alloc::vec::Vec;

/// Accumulated module content, turned into ordered sections on build.
#[derive(Default)]
struct ModuleScaffold {
    types: TypeSection,
    imports: ImportSection,
    functions: FunctionSection,
    tables: TableSection,
    memories: MemorySection,
    globals: GlobalSection,
    exports: ExportSection,
    start: Option<u32>,
    elements: ElementSection,
    code: CodeSection,
    data: DataSection,
    other: Vec<Section>,
}

/// Builder of a whole module.
pub struct ModuleBuilder<F = Identity> {
    callback: F,
    module: ModuleScaffold,
}

/// Start building a module.
pub fn module() -> ModuleBuilder {
    ModuleBuilder::new()
}

impl ModuleBuilder {
    /// New module builder with no callback.
    pub fn new() -> Self {
        ModuleBuilder::with_callback(Identity)
    }
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        ModuleBuilder::new()
    }
}

impl<F> ModuleBuilder<F>
where
    F: Invoke<Module>,
{
    /// New module builder finalized by the given callback.
    pub fn with_callback(callback: F) -> Self {
        ModuleBuilder {
            callback,
            module: ModuleScaffold::default(),
        }
    }

    /// Add an arbitrary section, appended after the known ones.
    pub fn with_section(mut self, section: Section) -> Self {
        self.module.other.push(section);
        self
    }

    /// Register a signature, reusing an existing equal entry if present,
    /// and return its type index.
    pub fn push_signature(&mut self, signature: FunctionType) -> u32 {
        let types = self.module.types.types_mut();
        if let Some(index) = types
            .iter()
            .position(|ty| matches!(ty, Type::Function(existing) if *existing == signature))
        {
            return index as u32;
        }
        types.push(Type::Function(signature));
        (types.len() - 1) as u32
    }

    /// Push a finished function definition, returning its index in the
    /// module-defined function space.
    pub fn push_function(&mut self, function: FunctionDefinition) -> u32 {
        let type_index = match function.signature {
            Signature::Inline(signature) => self.push_signature(signature),
            Signature::TypeReference(index) => index,
        };
        self.module
            .functions
            .entries_mut()
            .push(Func::new(type_index));
        self.module.code.bodies_mut().push(function.body);
        (self.module.functions.entries().len() - 1) as u32
    }

    /// Push an import entry.
    pub fn push_import(&mut self, entry: ImportEntry) {
        self.module.imports.entries_mut().push(entry);
    }

    /// Push an export entry.
    pub fn push_export(&mut self, entry: ExportEntry) {
        self.module.exports.entries_mut().push(entry);
    }

    /// Start building a function.
    pub fn function(self) -> FunctionBuilder<Self> {
        FunctionBuilder::with_callback(self)
    }

    /// Start building an import entry.
    pub fn import(self) -> ImportBuilder<Self> {
        ImportBuilder::with_callback(self)
    }

    /// Start building an export entry.
    pub fn export(self) -> ExportBuilder<Self> {
        ExportBuilder::with_callback(self)
    }

    /// Start building a global.
    pub fn global(self) -> GlobalBuilder<Self> {
        GlobalBuilder::with_callback(self)
    }

    /// Start building a memory.
    pub fn memory(self) -> MemoryBuilder<Self> {
        MemoryBuilder::with_callback(self)
    }

    /// Start building a table.
    pub fn table(self) -> TableBuilder<Self> {
        TableBuilder::with_callback(self)
    }

    /// Start building a data segment.
    pub fn data(self) -> DataSegmentBuilder<Self> {
        DataSegmentBuilder::with_callback(self)
    }

    /// Set the start function index.
    pub fn with_start(mut self, index: u32) -> Self {
        self.module.start = Some(index);
        self
    }

    /// Finish the module.
    pub fn build(self) -> F::Result {
        let scaffold = self.module;
        let mut module = Module::default();

        if !scaffold.types.types().is_empty() {
            module.insert_section(Section::Type(scaffold.types));
        }
        if !scaffold.imports.entries().is_empty() {
            module.insert_section(Section::Import(scaffold.imports));
        }
        if !scaffold.functions.entries().is_empty() {
            module.insert_section(Section::Function(scaffold.functions));
        }
        if !scaffold.tables.entries().is_empty() {
            module.insert_section(Section::Table(scaffold.tables));
        }
        if !scaffold.memories.entries().is_empty() {
            module.insert_section(Section::Memory(scaffold.memories));
        }
        if !scaffold.globals.entries().is_empty() {
            module.insert_section(Section::Global(scaffold.globals));
        }
        if !scaffold.exports.entries().is_empty() {
            module.insert_section(Section::Export(scaffold.exports));
        }
        if let Some(index) = scaffold.start {
            module.insert_section(Section::Start(StartSection::new(index)));
        }
        if !scaffold.elements.entries().is_empty() {
            module.insert_section(Section::Element(scaffold.elements));
        }
        if !scaffold.code.bodies().is_empty() {
            module.insert_section(Section::Code(scaffold.code));
        }
        if !scaffold.data.entries().is_empty() {
            module.insert_section(Section::Data(scaffold.data));
        }
        for section in scaffold.other {
            module.insert_section(section);
        }

        self.callback.invoke(module)
    }
}

impl<F> Invoke<FunctionDefinition> for ModuleBuilder<F>
where
    F: Invoke<Module>,
{
    type Result = Self;

    fn invoke(mut self, function: FunctionDefinition) -> Self {
        self.push_function(function);
        self
    }
}

impl<F> Invoke<ImportEntry> for ModuleBuilder<F>
where
    F: Invoke<Module>,
{
    type Result = Self;

    fn invoke(mut self, entry: ImportEntry) -> Self {
        self.push_import(entry);
        self
    }
}

impl<F> Invoke<ExportEntry> for ModuleBuilder<F>
where
    F: Invoke<Module>,
{
    type Result = Self;

    fn invoke(mut self, entry: ExportEntry) -> Self {
        self.push_export(entry);
        self
    }
}

impl<F> Invoke<GlobalEntry> for ModuleBuilder<F>
where
    F: Invoke<Module>,
{
    type Result = Self;

    fn invoke(mut self, entry: GlobalEntry) -> Self {
        self.module.globals.entries_mut().push(entry);
        self
    }
}

impl<F> Invoke<MemoryType> for ModuleBuilder<F>
where
    F: Invoke<Module>,
{
    type Result = Self;

    fn invoke(mut self, memory: MemoryType) -> Self {
        self.module.memories.entries_mut().push(memory);
        self
    }
}

impl<F> Invoke<TableDefinition> for ModuleBuilder<F>
where
    F: Invoke<Module>,
{
    type Result = Self;

    fn invoke(mut self, table: TableDefinition) -> Self {
        self.module.tables.entries_mut().push(table.table_type);
        let table_index = (self.module.tables.entries().len() - 1) as u32;
        for entry in table.elements {
            self.module.elements.entries_mut().push(ElementSegment::new(
                table_index,
                InitExpr::new(alloc::vec![Instruction::I32Const(entry.offset as i32)]),
                entry.values,
            ));
        }
        self
    }
}

impl<F> Invoke<DataSegment> for ModuleBuilder<F>
where
    F: Invoke<Module>,
{
    type Result = Self;

    fn invoke(mut self, segment: DataSegment) -> Self {
        self.module.data.entries_mut().push(segment);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{
        deserialize_buffer, serialize, Instructions, ValueType,
    };

    #[test]
    fn empty_module() {
        let module = module().build();
        assert!(module.sections().is_empty());
    }

    #[test]
    fn module_roundtrips_through_binary() {
        let built = module()
            .function()
            .signature()
            .with_params(alloc::vec![ValueType::I32, ValueType::I32])
            .with_result(ValueType::I32)
            .build()
            .body()
            .with_instructions(Instructions::new(alloc::vec![
                Instruction::GetLocal(0),
                Instruction::GetLocal(1),
                Instruction::I32Add,
            ]))
            .build()
            .build()
            .export()
            .field("add")
            .internal()
            .func(0)
            .build()
            .build();

        let bytes = serialize(built.clone()).unwrap();
        let parsed: Module = deserialize_buffer(&bytes).unwrap();
        assert_eq!(parsed, built);
    }

    #[test]
    fn signatures_are_deduplicated() {
        let mut builder = module();
        let a = builder.push_signature(FunctionType::new(
            alloc::vec![ValueType::I32],
            alloc::vec![],
        ));
        let b = builder.push_signature(FunctionType::new(
            alloc::vec![ValueType::I32],
            alloc::vec![],
        ));
        let c = builder.push_signature(FunctionType::new(
            alloc::vec![ValueType::I64],
            alloc::vec![],
        ));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn sections_come_out_in_canonical_order() {
        let built = module()
            .data()
            .offset(Instruction::I32Const(0))
            .value(alloc::vec![1])
            .build()
            .memory()
            .with_min(1)
            .build()
            .function()
            .body()
            .build()
            .build()
            .with_start(0)
            .build();

        let ids: Vec<u8> = built.sections().iter().map(Section::id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }
}
