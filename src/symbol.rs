// CLCore Symbol Table and Package System
//
// Interned symbols with O(1) identity comparison, grouped into packages.

use crate::types::Value;
use std::collections::HashMap;

/// Unique identifier for a symbol (index into symbol table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

/// Unique identifier for a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackageId(pub u32);

impl PackageId {
    pub const KEYWORD: PackageId = PackageId(0);
    pub const COMMON_LISP: PackageId = PackageId(1);
    pub const CL_USER: PackageId = PackageId(2);
}

/// A symbol and its global cells
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    /// Home package (None for uninterned symbols)
    pub package: Option<PackageId>,
    /// Global value cell
    pub value: Option<Value>,
    /// Global function cell
    pub function: Option<Value>,
    /// Value may not be rebound or assigned
    pub constant: bool,
    /// Proclaimed special: bindings are dynamic
    pub special: bool,
}

impl Symbol {
    pub fn new(name: String, package: Option<PackageId>) -> Self {
        Self {
            name,
            package,
            value: None,
            function: None,
            constant: false,
            special: false,
        }
    }

    pub fn is_keyword(&self) -> bool {
        self.package == Some(PackageId::KEYWORD)
    }
}

#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub nicknames: Vec<String>,
    internal: HashMap<String, SymbolId>,
    external: HashMap<String, SymbolId>,
    use_list: Vec<PackageId>,
}

impl Package {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_uppercase(),
            nicknames: Vec::new(),
            internal: HashMap::new(),
            external: HashMap::new(),
            use_list: Vec::new(),
        }
    }

    pub fn use_package(&mut self, pkg: PackageId) {
        if !self.use_list.contains(&pkg) {
            self.use_list.push(pkg);
        }
    }

    pub fn export(&mut self, name: &str, sym: SymbolId) {
        self.internal.remove(name);
        self.external.insert(name.to_string(), sym);
    }

    pub fn find_external(&self, name: &str) -> Option<SymbolId> {
        self.external.get(name).copied()
    }

    /// Symbols present in this package, internal or external. Inherited ones are not.
    pub fn find_symbol(&self, name: &str) -> Option<SymbolId> {
        self.external
            .get(name)
            .or_else(|| self.internal.get(name))
            .copied()
    }
}

#[derive(Debug)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    packages: Vec<Package>,
    package_names: HashMap<String, PackageId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            symbols: Vec::new(),
            packages: Vec::new(),
            package_names: HashMap::new(),
        };

        table.create_package("KEYWORD");
        table.create_package("COMMON-LISP");
        table.create_package("CL-USER");
        table.packages[PackageId::CL_USER.0 as usize].use_package(PackageId::COMMON_LISP);

        table
    }

    pub fn create_package(&mut self, name: &str) -> PackageId {
        let upper = name.to_uppercase();
        if let Some(existing) = self.package_names.get(&upper) {
            return *existing;
        }

        let id = PackageId(self.packages.len() as u32);
        let mut pkg = Package::new(&upper);
        if upper == "COMMON-LISP" {
            pkg.nicknames.push("CL".to_string());
        }

        self.package_names.insert(upper, id);
        for nick in &pkg.nicknames {
            self.package_names.insert(nick.clone(), id);
        }

        self.packages.push(pkg);
        id
    }

    /// Add `used` to the use-list of `pkg`.
    pub fn use_package(&mut self, pkg: PackageId, used: PackageId) {
        if let Some(p) = self.packages.get_mut(pkg.0 as usize) {
            p.use_package(used);
        }
    }

    pub fn find_package(&self, name: &str) -> Option<PackageId> {
        self.package_names.get(&name.to_uppercase()).copied()
    }

    pub fn get_package(&self, id: PackageId) -> Option<&Package> {
        self.packages.get(id.0 as usize)
    }

    pub fn package_name(&self, id: PackageId) -> Option<&str> {
        self.get_package(id).map(|p| p.name.as_str())
    }

    pub fn get_symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.0 as usize)
    }

    pub fn get_symbol_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
        self.symbols.get_mut(id.0 as usize)
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Find a symbol present in `pkg` by its (already case-folded) name.
    pub fn find_symbol(&self, name: &str, pkg: PackageId) -> Option<SymbolId> {
        self.get_package(pkg).and_then(|p| p.find_symbol(name))
    }

    /// Intern a symbol in a specific package. Inherited external symbols win.
    pub fn intern_in(&mut self, name: &str, pkg_id: PackageId) -> SymbolId {
        if let Some(pkg) = self.packages.get(pkg_id.0 as usize) {
            if let Some(sym) = pkg.find_symbol(name) {
                return sym;
            }
            for used_id in &pkg.use_list {
                if let Some(sym) = self
                    .packages
                    .get(used_id.0 as usize)
                    .and_then(|used| used.find_external(name))
                {
                    return sym;
                }
            }
        }

        let sym_id = SymbolId(self.symbols.len() as u32);
        let mut symbol = Symbol::new(name.to_string(), Some(pkg_id));

        if let Some(pkg) = self.packages.get_mut(pkg_id.0 as usize) {
            if pkg_id == PackageId::KEYWORD {
                // Keywords are external constants that evaluate to themselves
                symbol.value = Some(Value::Symbol(sym_id));
                symbol.constant = true;
                pkg.external.insert(name.to_string(), sym_id);
            } else {
                pkg.internal.insert(name.to_string(), sym_id);
            }
        }

        self.symbols.push(symbol);
        sym_id
    }

    pub fn intern_keyword(&mut self, name: &str) -> SymbolId {
        self.intern_in(name, PackageId::KEYWORD)
    }

    /// Create an uninterned symbol
    pub fn make_symbol(&mut self, name: &str) -> SymbolId {
        let sym_id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol::new(name.to_string(), None));
        sym_id
    }

    pub fn symbol_name(&self, id: SymbolId) -> Option<&str> {
        self.get_symbol(id).map(|s| s.name.as_str())
    }

    pub fn symbol_package(&self, id: SymbolId) -> Option<PackageId> {
        self.get_symbol(id).and_then(|s| s.package)
    }

    pub fn is_keyword(&self, id: SymbolId) -> bool {
        self.get_symbol(id).map(Symbol::is_keyword).unwrap_or(false)
    }

    pub fn is_constant(&self, id: SymbolId) -> bool {
        self.get_symbol(id).map(|s| s.constant).unwrap_or(false)
    }

    pub fn is_special(&self, id: SymbolId) -> bool {
        self.get_symbol(id).map(|s| s.special).unwrap_or(false)
    }

    /// Externally visible in its home package
    pub fn is_external(&self, id: SymbolId) -> bool {
        self.get_symbol(id)
            .and_then(|s| s.package.map(|pkg| (pkg, &s.name)))
            .and_then(|(pkg, name)| self.get_package(pkg)?.find_external(name))
            == Some(id)
    }

    /// Export a symbol from its home package
    pub fn export_symbol(&mut self, id: SymbolId) {
        if let Some(sym) = self.get_symbol(id) {
            if let Some(pkg_id) = sym.package {
                let name = sym.name.clone();
                if let Some(pkg) = self.packages.get_mut(pkg_id.0 as usize) {
                    pkg.export(&name, id);
                }
            }
        }
    }

    pub fn proclaim_special(&mut self, id: SymbolId) {
        if let Some(sym) = self.get_symbol_mut(id) {
            sym.special = true;
        }
    }

    pub fn symbol_value(&self, id: SymbolId) -> Option<&Value> {
        self.get_symbol(id).and_then(|s| s.value.as_ref())
    }

    pub fn set_symbol_value(&mut self, id: SymbolId, value: Value) {
        if let Some(sym) = self.get_symbol_mut(id) {
            sym.value = Some(value);
        }
    }

    pub fn symbol_function(&self, id: SymbolId) -> Option<&Value> {
        self.get_symbol(id).and_then(|s| s.function.as_ref())
    }

    pub fn set_symbol_function(&mut self, id: SymbolId, function: Value) {
        if let Some(sym) = self.get_symbol_mut(id) {
            sym.function = Some(function);
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
