//! Random display names, Shona style.

const NAMES: &[&str] = &[
    "Mwoyo weShumba",
    "Sadza neNyama",
    "Bapiro reHuku",
    "Mazondo",
    "Mhepo yeZhizha",
    "Mvura Inonaya",
    "Tambawoga",
    "Mumba Muno",
    "Huku iShiri?",
    "Hove Huru",
    "Kwatabva Kure",
    "Patakazonyatsozvifungisisa",
    "Nyika Yedu",
    "Zvandofarira",
    "Mutauro Wedu",
    "Zvese Zvese",
    "Mufaro weMoyo",
    "Svondo neMuvhuro",
    "Mwana waMambo",
    "Umwe Wangu",
];

/// Pick a name from the fixed word list, uniformly.
pub fn random_name() -> String {
    let mut bytes = [0u8; 4];
    let index = match getrandom::getrandom(&mut bytes) {
        Ok(()) => u32::from_le_bytes(bytes) as usize % NAMES.len(),
        Err(e) => {
            log::warn!("getrandom failed, using first name: {}", e);
            0
        }
    };
    NAMES[index].to_string()
}
