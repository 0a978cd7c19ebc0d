/// An EPSG coordinate reference system code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Epsg(pub u32);

impl Epsg {
    pub const WGS84: Epsg = Epsg(4326);

    pub const fn new(code: u32) -> Self {
        Epsg(code)
    }
}

impl std::fmt::Display for Epsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}
