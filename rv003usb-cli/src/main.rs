use hidapi::HidApi;
use rv003usb::utils::{elf_to_bin, open_device};
use rv003usb::{flash_bin, verify_bin, FlashImage, Status, TargetConfig, Variant};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use structopt::StructOpt;

fn main() {
    pretty_env_logger::init();

    let args = Opt::from_args();

    let mut config = args.variant.config();
    if let Some(vid) = args.vid {
        config.vendor_id = vid;
    }
    if let Some(pid) = args.pid {
        config.product_id = pid;
    }
    log::debug!("{:?}", config);

    let api = HidApi::new().expect("Couldn't find system usb");

    let res = match args.cmd {
        Cmd::flash { file } => flash(&api, &get_binary(file), &config),
        Cmd::elf { path } => elf_to_bin(&get_binary(path), config.flash_base, config.flash_size)
            .and_then(|binary| flash(&api, &binary, &config)),
        Cmd::verify { file } => FlashImage::new(&get_binary(file), config.flash_size)
            .and_then(|image| {
                let d = open_device(&api, &config)?;
                verify_bin(&d, &image, &config)
            }),
        Cmd::resetIntoApp => {
            open_device(&api, &config).and_then(|d| rv003usb::run_app(&d, &config.limits))
        }
    };

    match res {
        Ok(()) => println!("Success"),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn flash(api: &HidApi, binary: &[u8], config: &TargetConfig) -> rv003usb::Result<()> {
    flash_bin(
        binary,
        config,
        &mut |status: Status| println!("{}", status),
        |config| {
            let d = open_device(api, config)?;
            println!(
                "found {:?} {:?}",
                d.get_manufacturer_string(),
                d.get_product_string()
            );
            Ok(d)
        },
    )
}

fn get_binary(file: PathBuf) -> Vec<u8> {
    let mut f = File::open(&file).unwrap_or_else(|e| {
        eprintln!("Error: can't open {}: {}", file.display(), e);
        std::process::exit(1);
    });
    let mut binary = Vec::new();
    f.read_to_end(&mut binary).expect("failed to read file");
    binary
}

fn parse_hex_16(input: &str) -> Result<u16, std::num::ParseIntError> {
    if input.starts_with("0x") {
        u16::from_str_radix(&input[2..], 16)
    } else {
        input.parse::<u16>()
    }
}

#[allow(non_camel_case_types)]
#[derive(StructOpt, Debug, PartialEq)]
pub enum Cmd {
    ///Start the application without flashing.
    resetIntoApp,

    /// flash binary, note includes a verify and reset into app
    flash {
        #[structopt(short = "f", name = "file", long = "file")]
        file: PathBuf,
    },

    /// compare flash with a binary, nothing is written
    verify {
        #[structopt(short = "f", name = "file", long = "file")]
        file: PathBuf,
    },

    /// flash elf, note includes a verify and reset into app
    elf {
        #[structopt(parse(from_os_str))]
        path: PathBuf,
    },
}

#[derive(Debug, StructOpt)]
#[structopt(name = "rv003usb", about = "Flash CH32V003 parts over the rv003usb bootloader")]
struct Opt {
    #[structopt(subcommand)]
    cmd: Cmd,

    #[structopt(short = "p", name = "pid", long = "pid", parse(try_from_str = parse_hex_16))]
    pid: Option<u16>,
    #[structopt(short = "v", name = "vid", long = "vid", parse(try_from_str = parse_hex_16))]
    vid: Option<u16>,
    /// target part, v003 or v006
    #[structopt(long = "variant", default_value = "v003")]
    variant: Variant,
}
