use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};

use orao::disk::{
    cylinder_capacity, Disk, DiskError, FileType, FormatProfile, Geometry, LoadParameters,
    BASIC_LOAD, V1, V2,
};
use rand::{Rng, XorShiftRng};

const ITERATIONS: usize = 20;
const MAX_ITERATIONS_PER_IMAGE: usize = 2_000;
const DELETE_CHANCE: f32 = 0.33;
const ADD_CHANCE: f32 = 0.66;
const OVERSIZE_CHANCE: f32 = 0.05;
const RNG_SEED: [u8; 16] = [
    0x3F, 0x82, 0x0D, 0xA4, 0x61, 0x19, 0xC7, 0x5E, 0x0B, 0x90, 0xE2, 0x47, 0x7A, 0x13, 0xD8, 0x26,
];

static PROFILES: &[&FormatProfile] = &[&V1, &V2];

fn deterministic_rng() -> XorShiftRng {
    rand::SeedableRng::from_seed(RNG_SEED)
}

fn random_name(rng: &mut impl Rng) -> String {
    const NAME_CHARACTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    const MIN_NAME_SIZE: usize = 1;
    const MAX_NAME_SIZE: usize = 15;
    let name_size = rng.gen_range(MIN_NAME_SIZE, MAX_NAME_SIZE + 1);
    (0..name_size)
        .map(|_| NAME_CHARACTERS[rng.gen_range(0, NAME_CHARACTERS.len())] as char)
        .collect()
}

fn random_available_name(rng: &mut impl Rng, disk: &Disk) -> String {
    loop {
        let name = random_name(rng);
        match disk.check_filename_availability(&name) {
            Ok(_) => return name,
            Err(ref e) => match DiskError::from_io_error(e) {
                Some(ref e) if *e == DiskError::FileExists => {}
                Some(_) | None => panic!("cannot check filename availability: {}", e),
            },
        }
    }
}

fn random_file_type(rng: &mut impl Rng) -> FileType {
    static FILE_TYPES: &[FileType] = &[FileType::Object, FileType::Basic];
    FILE_TYPES[rng.gen_range(0, FILE_TYPES.len())]
}

/// A random geometry whose cylinders can hold at least one block.
fn random_geometry(rng: &mut impl Rng, profile: &FormatProfile) -> Geometry {
    loop {
        let geometry = Geometry::new(
            &random_name(rng),
            rng.gen_range(2, 24),
            rng.gen_range(1, 4),
            rng.gen_range(2, 12),
        )
        .unwrap();
        if cylinder_capacity(&geometry, profile) > 0 {
            return geometry;
        }
    }
}

struct RandomFile {
    name: String,
    file_type: FileType,
    load: LoadParameters,
    contents: Vec<u8>,
}

impl RandomFile {
    fn new(mut rng: &mut XorShiftRng, disk: &Disk, capacity: usize) -> RandomFile {
        let name = random_available_name(&mut rng, disk);
        let size = if rng.gen::<f32>() < OVERSIZE_CHANCE {
            rng.gen_range(capacity + 1, capacity + 1024)
        } else {
            rng.gen_range(1, capacity + 1)
        };
        let file_type = random_file_type(&mut rng);
        let start_address = rng.gen_range(0, 0x10000 - size as u32) as u16;
        let mut contents = vec![0u8; size];
        rng.fill(&mut contents[..]);
        RandomFile {
            name,
            file_type,
            load: LoadParameters {
                start_address,
                auto_address: start_address,
                flag: rng.gen(),
            },
            contents,
        }
    }

    fn write(&self, disk: &mut Disk) -> io::Result<usize> {
        let entry = disk.write_file(&self.name, self.file_type, self.load, &self.contents)?;
        Ok(entry.cylinder)
    }

    fn verify(&self, disk: &Disk, cylinder: usize) -> io::Result<()> {
        let entries = disk.find(self.name.as_str())?;
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];

        // Check catalog entry.
        let load = match self.file_type {
            FileType::Basic => BASIC_LOAD,
            _ => self.load,
        };
        assert_eq!(entry.cylinder, cylinder);
        assert_eq!(entry.file_type, self.file_type);
        assert_eq!(entry.start_address, load.start_address);
        assert_eq!(entry.auto_address, load.auto_address);
        assert_eq!(entry.flag, load.flag);
        assert_eq!(entry.data_size()?, self.contents.len());

        // Read file.
        let mut read_contents = Vec::new();
        disk.extract(entry, &mut read_contents)?;
        assert_eq!(self.contents, read_contents);

        Ok(())
    }
}

impl fmt::Debug for RandomFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "RandomFile {{ name: {:?}, size: {}, file_type: {} }}",
            self.name,
            self.contents.len(),
            self.file_type
        )
    }
}

/// Cylinder occupancy as the catalog should describe it: `None` for an END or
/// deleted slot.
struct Slots(Vec<Option<RandomFile>>);

impl Slots {
    fn new(geometry: &Geometry) -> Slots {
        Slots((0..geometry.cylinders).map(|_| None).collect())
    }

    /// New files take the lowest free data cylinder.
    fn first_free(&self) -> Option<usize> {
        (1..self.0.len()).find(|&c| self.0[c].is_none())
    }

    fn occupied(&self) -> Vec<usize> {
        (1..self.0.len()).filter(|&c| self.0[c].is_some()).collect()
    }
}

fn verify_disk_state(disk: &Disk, slots: &Slots) -> io::Result<()> {
    let expected: Vec<(usize, String)> = slots
        .occupied()
        .into_iter()
        .map(|c| (c, slots.0[c].as_ref().unwrap().name.clone()))
        .collect();
    let actual: Vec<(usize, String)> = disk
        .directory()?
        .into_iter()
        .map(|e| (e.cylinder, e.filename))
        .collect();
    assert_eq!(actual, expected);
    assert_eq!(
        disk.blocks_free()?,
        disk.geometry().cylinders - 1 - expected.len()
    );
    Ok(())
}

#[test]
fn integration_test() {
    let mut rng = deterministic_rng();

    for i in 0..ITERATIONS {
        for &profile in PROFILES {
            let geometry = random_geometry(&mut rng, profile);
            println!(
                "Iteration: {} profile: {} geometry: {:?}",
                i, profile.name, geometry
            );

            let mut disk = Disk::open_memory(&geometry, profile).unwrap();
            let capacity = cylinder_capacity(&geometry, profile);
            assert!(disk.directory().unwrap().is_empty());
            assert_eq!(disk.blocks_free().unwrap(), geometry.cylinders - 1);

            let mut slots = Slots::new(&geometry);
            let mut disk_full = false;
            for _i in 0..MAX_ITERATIONS_PER_IMAGE {
                // Randomly add files
                if rng.gen::<f32>() < ADD_CHANCE {
                    let random_file = RandomFile::new(&mut rng, &disk, capacity);
                    // println!("Add: {:?}", random_file);
                    match random_file.write(&mut disk) {
                        Ok(cylinder) => {
                            assert_eq!(Some(cylinder), slots.first_free());
                            random_file.verify(&disk, cylinder).unwrap();
                            slots.0[cylinder] = Some(random_file);
                        }
                        Err(ref e) if e == &DiskError::FileTooLarge => {
                            assert!(random_file.contents.len() > capacity);
                        }
                        Err(ref e) if e == &DiskError::NoFreeSlot => {
                            // Confirm the legitimacy of this error, then
                            // conclude the test of this disk image.
                            assert_eq!(slots.first_free(), None);
                            disk_full = true;
                            break;
                        }
                        Err(ref e) => panic!("error writing {:?}: {}", random_file, e),
                    };
                    verify_disk_state(&disk, &slots).unwrap();
                }

                // Randomly erase files
                if rng.gen::<f32>() < DELETE_CHANCE {
                    let occupied = slots.occupied();
                    if !occupied.is_empty() {
                        let cylinder = occupied[rng.gen_range(0, occupied.len())];
                        let target = slots.0[cylinder].take().unwrap();
                        // println!("Erase: {:?}", target);
                        let erased = disk
                            .erase_matching(target.name.as_str(), |_| true)
                            .unwrap();
                        assert_eq!(erased.len(), 1);
                        assert_eq!(erased[0].cylinder, cylinder);
                    }
                    verify_disk_state(&disk, &slots).unwrap();
                }
            }
            assert!(disk_full);

            // Re-verify all remaining files.
            for cylinder in slots.occupied() {
                slots.0[cylinder]
                    .as_ref()
                    .unwrap()
                    .verify(&disk, cylinder)
                    .unwrap();
            }

            // Formatting forgets every file.
            disk.write_format().unwrap();
            verify_disk_state(&disk, &Slots::new(&geometry)).unwrap();
        }
    }
}

#[test]
fn file_backed_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ORAO.HDD");
    let geometry = Geometry::new("BACKUP", 10, 2, 9).unwrap();
    let mut rng = deterministic_rng();
    let mut contents = vec![0u8; 3000];
    rng.fill(&mut contents[..]);

    for &profile in PROFILES {
        {
            let mut disk = Disk::create(&path, &geometry, profile, false).unwrap();
            disk.write_file("PROGRAM", FileType::Basic, LoadParameters::default(), &contents)
                .unwrap();
            disk.write_file(
                "MONITOR",
                FileType::Object,
                LoadParameters {
                    start_address: 0x8000,
                    auto_address: 0x8003,
                    flag: 0x00,
                },
                &contents[..2048],
            )
            .unwrap();
            disk.flush().unwrap();
        }

        let disk = Disk::open(&path, false, profile).unwrap();
        assert_eq!(disk.geometry(), &geometry);
        assert_eq!(disk.blocks_free().unwrap(), 7);
        let listing: Vec<String> = disk
            .directory()
            .unwrap()
            .iter()
            .map(|e| e.to_string())
            .collect();
        assert_eq!(
            listing,
            vec![
                "PROGRAM          B  0400 0FB7 B147 12",
                "MONITOR          O  8000 87FF 8003 00",
            ]
        );
        let mut extracted = vec![];
        disk.extract(&disk.find("PROGRAM").unwrap()[0], &mut extracted)
            .unwrap();
        assert_eq!(extracted, contents);
    }

    // Trailing padding is tolerated by the second generation only.  The last
    // header written stores the highest cylinder index, which the first
    // generation reads as a count.
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0u8; 512]).unwrap();
    drop(file);
    assert!(Disk::open(&path, false, &V2).is_ok());
    assert_eq!(
        Disk::open(&path, false, &V1).unwrap_err(),
        DiskError::GeometryMismatch {
            expected: 9 * 2 * 9 * 512,
            actual: 10 * 2 * 9 * 512 + 512
        }
    );
}
