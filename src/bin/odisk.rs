use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use log::debug;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::Path;
use std::process;

use orao::disk::{self, Disk, DirectoryEntry, FileType, FormatProfile, Geometry, LoadParameters};

// Possible exit codes
static _EXIT_SUCCESS: i32 = 0;
static EXIT_FAILURE: i32 = 1;

/// If a dash is specified for a filename, this indicates that the user wants
/// to read from standard input or write to standard output.
static STDINOUT_PSEUDOFILENAME: &str = "-";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Parse command-line arguments
    let app = App::new("Orao Disk Image Utility")
        .version("0.1.0")
        .about("Read, write, and understand Orao hard disk images.")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(Arg::with_name("diskimage").required(true))
        .arg(
            Arg::with_name("profile")
                .short("p")
                .long("profile")
                .takes_value(true)
                .possible_values(&["v1", "v2"])
                .default_value("v1")
                .help("Image format generation"),
        )
        .subcommand(
            SubCommand::with_name("create")
                .about("Create a blank disk image")
                .arg(
                    Arg::with_name("name")
                        .short("n")
                        .long("name")
                        .takes_value(true)
                        .help("Volume name (default ORAO)"),
                )
                .arg(
                    Arg::with_name("cylinders")
                        .short("c")
                        .long("cylinders")
                        .takes_value(true)
                        .validator(number_validator)
                        .help("Number of cylinders (default 124)"),
                )
                .arg(
                    Arg::with_name("heads")
                        .short("H")
                        .long("heads")
                        .takes_value(true)
                        .validator(number_validator)
                        .help("Number of heads (default 16)"),
                )
                .arg(
                    Arg::with_name("sectors")
                        .short("s")
                        .long("sectors")
                        .takes_value(true)
                        .validator(number_validator)
                        .help("Sectors per track (default 63)"),
                )
                .arg(yes_arg("Overwrite an existing file without asking")),
        )
        .subcommand(
            SubCommand::with_name("format")
                .about("Erase the catalog of a disk image")
                .arg(yes_arg("Do not ask for confirmation")),
        )
        .subcommand(SubCommand::with_name("dir").about("Show a catalog listing"))
        .subcommand(
            SubCommand::with_name("extract")
                .about("Read file(s) from a disk image.")
                .arg(Arg::with_name("pattern").required(true))
                .arg(Arg::with_name("destination_filename").required(false)),
        )
        .subcommand(
            SubCommand::with_name("inject")
                .about("Write a file to a disk image.")
                .arg(
                    Arg::with_name("type")
                        .short("t")
                        .long("type")
                        .takes_value(true)
                        .possible_values(&["O", "B", "o", "b"])
                        .default_value("O")
                        .help("File type: Object or BASIC"),
                )
                .arg(
                    Arg::with_name("start")
                        .long("start")
                        .takes_value(true)
                        .validator(hex_u16_validator)
                        .help("Load address, in hex (Object files only)"),
                )
                .arg(
                    Arg::with_name("auto")
                        .long("auto")
                        .takes_value(true)
                        .validator(hex_u16_validator)
                        .help("Auto-start address, in hex (defaults to the load address)"),
                )
                .arg(
                    Arg::with_name("flag")
                        .long("flag")
                        .takes_value(true)
                        .validator(hex_u8_validator)
                        .help("Flag byte, in hex"),
                )
                .arg(Arg::with_name("source_filename").required(true))
                .arg(Arg::with_name("destination_filename").required(false)),
        )
        .subcommand(
            SubCommand::with_name("erase")
                .about("Erase file(s) from a disk image.")
                .arg(Arg::with_name("pattern").required(true))
                .arg(yes_arg("Do not ask for confirmation")),
        );

    let mut app_clone = app.clone();
    let matches = app.get_matches();

    let diskimage = matches.value_of("diskimage").unwrap();
    let profile = matches
        .value_of("profile")
        .and_then(FormatProfile::from_name)
        .unwrap_or(&disk::V1);
    let result = match matches.subcommand() {
        ("create", Some(m)) => cmd_create(diskimage, profile, m),
        ("format", Some(m)) => cmd_format(diskimage, profile, m.is_present("yes")),
        ("dir", Some(_)) => cmd_dir(diskimage, profile),
        ("extract", Some(m)) => cmd_extract(
            diskimage,
            profile,
            m.value_of("pattern").unwrap(),
            m.value_of("destination_filename"),
        ),
        ("inject", Some(m)) => cmd_inject(diskimage, profile, m),
        ("erase", Some(m)) => cmd_erase(
            diskimage,
            profile,
            m.value_of("pattern").unwrap(),
            m.is_present("yes"),
        ),
        _ => {
            app_clone.print_help().unwrap();
            println!();
            process::exit(EXIT_FAILURE);
        }
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(EXIT_FAILURE);
    }
}

fn yes_arg(help: &'static str) -> Arg<'static, 'static> {
    Arg::with_name("yes").short("y").long("yes").help(help)
}

fn number_validator(v: String) -> Result<(), String> {
    match v.parse::<usize>() {
        Ok(_) => Ok(()),
        Err(_) => Err("Expected a decimal number.".to_string()),
    }
}

/// Parse a hexadecimal value, with or without a "0x" or "$" prefix.
fn hex_parser(v: &str) -> Result<u32, ()> {
    let digits = v
        .trim_start_matches("0x")
        .trim_start_matches("0X")
        .trim_start_matches('$');
    u32::from_str_radix(digits, 16).map_err(|_| ())
}

fn hex_u16_validator(v: String) -> Result<(), String> {
    match hex_parser(&v) {
        Ok(n) if n <= 0xFFFF => Ok(()),
        _ => Err("Expected a hexadecimal value from 0-FFFF.".to_string()),
    }
}

fn hex_u8_validator(v: String) -> Result<(), String> {
    match hex_parser(&v) {
        Ok(n) if n <= 0xFF => Ok(()),
        _ => Err("Expected a hexadecimal value from 0-FF.".to_string()),
    }
}

/// Ask a yes/no question on the terminal.  Anything but "y" is a no.
fn confirm(question: &str) -> io::Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

/// Open a file for reading
fn open_fs_reader(filename: &str) -> io::Result<Box<dyn Read>> {
    if filename == STDINOUT_PSEUDOFILENAME {
        Ok(Box::new(io::stdin()))
    } else {
        Ok(Box::new(fs::File::open(filename)?))
    }
}

/// Open a file for writing
fn open_fs_writer(filename: &str) -> io::Result<Box<dyn Write>> {
    if filename == STDINOUT_PSEUDOFILENAME {
        Ok(Box::new(io::stdout()))
    } else {
        Ok(Box::new(fs::File::create(filename)?))
    }
}

fn cmd_create(
    diskimage: &str,
    profile: &'static FormatProfile,
    m: &ArgMatches,
) -> io::Result<()> {
    let defaults = Geometry::default();
    let number = |name: &str, default: usize| -> usize {
        m.value_of(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    };
    let heads = number("heads", defaults.heads as usize);
    let sectors = number("sectors", defaults.sectors as usize);
    if heads > u8::MAX as usize || sectors > u8::MAX as usize {
        return Err(disk::DiskError::InvalidGeometry.into());
    }
    let geometry = Geometry::new(
        m.value_of("name").unwrap_or(&defaults.name),
        number("cylinders", defaults.cylinders),
        heads as u8,
        sectors as u8,
    )?;

    let exists = Path::new(diskimage).exists();
    if exists && !m.is_present("yes") && !confirm(&format!("Overwrite {}?", diskimage))? {
        return Ok(());
    }
    let mut disk = Disk::create(diskimage, &geometry, profile, !exists)?;
    disk.flush()?;
    println!("{}", disk);
    Ok(())
}

fn cmd_format(diskimage: &str, profile: &'static FormatProfile, yes: bool) -> io::Result<()> {
    let mut disk = Disk::open(diskimage, true, profile)?;
    if !yes && !confirm(&format!("Erase all files on \"{}\"?", disk.name()))? {
        return Ok(());
    }
    disk.write_format()?;
    disk.flush()?;
    Ok(())
}

fn cmd_dir(diskimage: &str, profile: &'static FormatProfile) -> io::Result<()> {
    let disk = Disk::open(diskimage, false, profile)?;
    println!("{}", disk);
    println!("{:16} T  STRT END  AUTO FL", "NAME");
    for entry in disk.iter().active() {
        println!("{}", entry?);
    }
    println!("{} BLOCKS FREE", disk.blocks_free()?);
    Ok(())
}

fn cmd_extract(
    diskimage: &str,
    profile: &'static FormatProfile,
    pattern: &str,
    destination_filename: Option<&str>,
) -> io::Result<()> {
    let disk = Disk::open(diskimage, false, profile)?;
    let entries = disk.find(&disk::pattern(pattern)?)?;

    // An explicit destination only makes sense for a single file.
    let destination_filename = match destination_filename {
        Some(d) if entries.len() == 1 => Some(d),
        Some(d) => {
            debug!("{} files match; ignoring destination {}", entries.len(), d);
            None
        }
        None => None,
    };
    // Check every host filename before anything is written.
    let filenames = entries
        .iter()
        .map(|entry| match destination_filename {
            Some(d) => Ok(d),
            None => host_filename(&entry.filename),
        })
        .collect::<io::Result<Vec<&str>>>()?;
    for (entry, filename) in entries.iter().zip(filenames) {
        let mut writer = open_fs_writer(filename)?;
        let nbytes = disk.extract(entry, &mut writer)?;
        writer.flush()?;
        if filename != STDINOUT_PSEUDOFILENAME {
            println!("{} -> {} ({} bytes)", entry.filename, filename, nbytes);
        }
    }
    Ok(())
}

/// Use a catalog name as a host filename.  Catalog names may contain any
/// printable character, so names that would leave the current directory or
/// mean standard output are refused.
fn host_filename(disk_filename: &str) -> io::Result<&str> {
    let special = [".", "..", STDINOUT_PSEUDOFILENAME];
    if special.contains(&disk_filename) || disk_filename.contains(&['/', '\\'][..]) {
        return Err(disk::DiskError::InvalidFilename.into());
    }
    Ok(disk_filename)
}

/// Derive a catalog name from a host path: the uppercased file stem.
fn default_disk_filename(source_filename: &str) -> io::Result<String> {
    Path::new(source_filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| *s != STDINOUT_PSEUDOFILENAME)
        .map(|s| s.to_uppercase())
        .ok_or_else(|| disk::DiskError::InvalidFilename.into())
}

fn cmd_inject(
    diskimage: &str,
    profile: &'static FormatProfile,
    m: &ArgMatches,
) -> io::Result<()> {
    let source_filename = m.value_of("source_filename").unwrap();
    let destination_filename = match m.value_of("destination_filename") {
        Some(name) => name.to_string(),
        None => default_disk_filename(source_filename)?,
    };
    let file_type = m
        .value_of("type")
        .and_then(FileType::from_string)
        .unwrap_or(FileType::Object);
    let hex = |name: &str| m.value_of(name).and_then(|v| hex_parser(v).ok());
    let start_address = hex("start").unwrap_or(0) as u16;
    let load = LoadParameters {
        start_address,
        auto_address: hex("auto").map(|a| a as u16).unwrap_or(start_address),
        flag: hex("flag").unwrap_or(0) as u8,
    };

    let mut data = Vec::new();
    open_fs_reader(source_filename)?.read_to_end(&mut data)?;

    let mut disk = Disk::open(diskimage, true, profile)?;
    let entry = disk.write_file(&destination_filename, file_type, load, &data)?;
    disk.flush()?;
    println!("{}", entry);
    Ok(())
}

fn cmd_erase(
    diskimage: &str,
    profile: &'static FormatProfile,
    pattern: &str,
    yes: bool,
) -> io::Result<()> {
    let mut disk = Disk::open(diskimage, true, profile)?;
    let filter = disk::pattern(pattern)?;

    // Answers are gathered up front so that a failed prompt is reported
    // before anything is erased.
    let mut accepted: Vec<DirectoryEntry> = vec![];
    for entry in disk.find(&filter)? {
        if yes || confirm(&format!("Erase {}?", entry.filename))? {
            accepted.push(entry);
        }
    }
    let erased = disk.erase_matching(&filter, |entry| accepted.contains(entry))?;
    disk.flush()?;
    for entry in erased.iter() {
        println!("Erased {}", entry.filename);
    }
    Ok(())
}
