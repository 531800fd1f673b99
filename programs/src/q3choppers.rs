use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::process;

extern crate env_logger;
#[macro_use]
extern crate log;
extern crate svg;
use svg::Document;
use svg::node::Node;
use svg::node::element::{Group, Path, Rectangle, Style};
use svg::node::element::path::Data;
extern crate termcolor;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
#[macro_use]
extern crate clap;

extern crate q3choppers;
use q3choppers::errors::{Error, Result};
use q3choppers::geom::Bounds;
use q3choppers::input_buffer::InputBuffer;
use q3choppers::parse::bsp::FaceKind;
use q3choppers::universe::{self, EntityCategory};
use q3choppers::{BarePk3, CompressionMethod, Level, LoadLog};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = clap_app!(q3choppers =>
        (about: "Inspect Quake III pk3 archives and the levels inside them")
        (@arg color: -c --color +takes_value "Choose whether to use colored output (auto, always, never)")
        (@arg file: +required "Input pk3 file, or - for stdin")
        (@subcommand info =>
            (about: "Summarize an archive and every level in it")
        )
        (@subcommand list =>
            (about: "List archive entries with their compression and sizes")
        )
        (@subcommand extract =>
            (about: "Write one entry's uncompressed contents to a file")
            (@arg entry: +required "Path of the entry inside the archive")
            (@arg outfile: +required "Output file")
        )
        (@subcommand entities =>
            (about: "Print the entities of a level")
            (@arg map: +required "Path of the level inside the archive, e.g. maps/q3dm17.bsp")
        )
        (@subcommand chart =>
            (about: "Render a top-down SVG of a level")
            (@arg map: +required "Path of the level inside the archive")
            (@arg outfile: +required "Output file")
        )
    ).get_matches();

    let color = match args.value_of("color") {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    };

    if let Err(err) = run(&args) {
        drop(write_err(err, color));
        process::exit(1);
    }
}

fn write_err(err: Error, color: ColorChoice) -> Result<()> {
    let mut stderr = StandardStream::stderr(color);
    stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
    write!(&mut stderr, "error: ")?;
    stderr.set_color(&ColorSpec::new())?;
    writeln!(&mut stderr, "{}", err)?;
    for cause in err.iter().skip(1) {
        writeln!(&mut stderr, "  caused by: {}", cause)?;
    }
    if let Some(backtrace) = err.backtrace() {
        writeln!(&mut stderr, "{:?}", backtrace)?;
    }
    Ok(())
}

fn run(args: &clap::ArgMatches) -> Result<()> {
    // clap enforces +required
    let filename = args.value_of("file").unwrap_or("-");
    let input = InputBuffer::open(filename)?;
    let pk3 = q3choppers::parse_pk3(input.bytes())?;

    match args.subcommand() {
        ("info", Some(_)) => do_info(&pk3)?,
        ("list", Some(_)) => do_list(&pk3)?,
        ("extract", Some(subargs)) => do_extract(subargs, &pk3)?,
        ("entities", Some(subargs)) => do_entities(subargs, &pk3)?,
        ("chart", Some(subargs)) => do_chart(subargs, &pk3)?,
        _ => {
            println!("{}", args.usage());
        }
    }

    Ok(())
}

fn required<'a>(subargs: &'a clap::ArgMatches, name: &str) -> &'a str {
    subargs.value_of(name).unwrap_or("")
}

fn do_info(pk3: &BarePk3) -> Result<()> {
    println!("{} entries, central directory at {}", pk3.len(), pk3.end_of_directory.directory_offset);

    let mut namespaces = BTreeMap::new();
    let mut total_compressed = 0u64;
    let mut total_uncompressed = 0u64;
    for entry in pk3.iter() {
        let entry = entry?;
        if entry.is_directory() {
            continue;
        }
        *namespaces.entry(entry.namespace().name()).or_insert(0usize) += 1;
        total_compressed += entry.compressed_size as u64;
        total_uncompressed += entry.uncompressed_size as u64;
    }
    println!("{} bytes compressed, {} bytes uncompressed", total_compressed, total_uncompressed);
    for (name, count) in &namespaces {
        println!("  {:<10} {}", name, count);
    }

    let log = LoadLog::new("q3choppers");
    for entry in pk3.iter_maps() {
        let path = entry.path_lossy().into_owned();
        println!();
        println!("{}", path);
        // One broken level shouldn't hide the rest
        let loaded = match q3choppers::load_level(pk3, &path, &log) {
            Ok(loaded) => loaded,
            Err(err) => {
                println!("  unreadable: {}", err);
                continue;
            }
        };
        let level = &loaded.level;
        println!("  {} draws, {} triangles, {} skipped faces",
            level.draws.len(), level.indices.len() / 3, level.skipped_faces);
        println!("  {} vertices, {} lightmaps, {} effects",
            level.vertices.len(), level.lightmaps.len(), level.effects.len());
        let (found, missing, undecodable, unbound) = loaded.count_textures();
        println!("  textures: {} loaded, {} missing, {} undecodable, {} unbound",
            found, missing, undecodable, unbound);
        println!("  {} visibility clusters", loaded.visibility.cluster_count());
        if let Some(bounds) = level.bounds() {
            let size = bounds.size();
            println!("  extent {} x {} x {}", size.x, size.y, size.z);
        }

        let mut categories = BTreeMap::new();
        for entity in level.iter_entities() {
            *categories.entry(universe::categorize(&entity.classname).name()).or_insert(0usize) += 1;
        }
        println!("  {} entities", level.entities.len());
        for (name, count) in &categories {
            println!("    {:<12} {}", name, count);
        }
        match level.spawn_point() {
            Some(spawn) => println!("  spawn: {} at ({}, {}, {})",
                spawn.classname, spawn.origin.x, spawn.origin.y, spawn.origin.z),
            None => println!("  spawn: none"),
        }
    }

    Ok(())
}

fn do_list(pk3: &BarePk3) -> Result<()> {
    for entry in pk3.iter() {
        let entry = entry?;
        let method = match entry.compression() {
            CompressionMethod::Stored => "stored".to_owned(),
            CompressionMethod::Deflated => "deflate".to_owned(),
            CompressionMethod::Unsupported(method) => format!("method {}", method),
        };
        println!("{:>10} {:>10} {:<9} {}",
            entry.compressed_size, entry.uncompressed_size, method, entry.path_lossy());
    }
    Ok(())
}

fn do_extract(subargs: &clap::ArgMatches, pk3: &BarePk3) -> Result<()> {
    let entry_path = required(subargs, "entry");
    let outfile = required(subargs, "outfile");
    let bytes = pk3.read(entry_path.as_bytes())?;
    let mut file = File::create(outfile)?;
    file.write_all(&bytes)?;
    info!("wrote {} bytes to {}", bytes.len(), outfile);
    Ok(())
}

fn load_geometry(pk3: &BarePk3, map_path: &str) -> Result<Level> {
    let bytes = pk3.read(map_path.as_bytes())?;
    let bare = q3choppers::parse_bsp(&bytes)?;
    Level::from_bare(&bare)
}

fn do_entities(subargs: &clap::ArgMatches, pk3: &BarePk3) -> Result<()> {
    let level = load_geometry(pk3, required(subargs, "map"))?;
    for entity in level.iter_entities() {
        println!("{:<28} ({:8.1}, {:8.1}, {:8.1})  angle {:4}  spawnflags {:4}  {}",
            entity.classname,
            entity.origin.x, entity.origin.y, entity.origin.z,
            entity.angle, entity.spawnflags,
            universe::categorize(&entity.classname).name());
    }
    Ok(())
}

fn do_chart(subargs: &clap::ArgMatches, pk3: &BarePk3) -> Result<()> {
    let level = load_geometry(pk3, required(subargs, "map"))?;
    let doc = level_as_svg(&level);
    svg::save(required(subargs, "outfile"), &doc)?;
    Ok(())
}

fn category_color(category: EntityCategory) -> &'static str {
    match category {
        EntityCategory::PlayerStart => "green",
        EntityCategory::Weapon => "red",
        EntityCategory::Ammo => "orange",
        EntityCategory::Item => "blue",
        EntityCategory::Light => "yellow",
        EntityCategory::Trigger | EntityCategory::Target => "purple",
        EntityCategory::World | EntityCategory::Other => "gray",
    }
}

/// Project the level onto its floor plane.  After the load-time axis remap, x runs east and z runs
/// south, which already matches SVG's downward y.
fn level_as_svg(level: &Level) -> Document {
    let mut group = Group::new();
    let mut bounds = level.bounds();

    let mut classes = Vec::new();
    for draw in level.draws.iter() {
        let mut data = Data::new();
        for triangle in level.draw_triangles(draw) {
            data = data
            .move_to((triangle[0].x, triangle[0].z))
            .line_to((triangle[1].x, triangle[1].z))
            .line_to((triangle[2].x, triangle[2].z))
            .close();
        }

        classes.clear();
        classes.push("draw");
        classes.push(match draw.kind {
            FaceKind::Polygon => "polygon",
            FaceKind::Patch => "patch",
            FaceKind::Mesh => "mesh",
            _ => "other",
        });
        if level.textures.get(draw.texture).map_or(true, |texture| texture.is_unbound()) {
            classes.push("unbound");
        }

        let mut path = Path::new().set("d", data);
        path.assign("class", classes.join(" "));
        path.assign("data-face", draw.face);
        if let Some(texture) = level.textures.get(draw.texture) {
            path.assign("data-texture", texture.name.clone());
        }
        group.append(path);
    }

    for entity in level.iter_entities() {
        let (color, radius) = match universe::lookup_entity_type(&entity.classname) {
            Some(entity_type) => (category_color(entity_type.category), entity_type.radius),
            None => (category_color(universe::categorize(&entity.classname)), 8),
        };
        if radius == 0 {
            continue;
        }
        let radius = radius as f32;
        match bounds {
            Some(ref mut bounds) => bounds.extend(entity.origin),
            None => bounds = Some(Bounds::from_point(entity.origin)),
        }
        group.append(
            Rectangle::new()
            .set("x", entity.origin.x - radius)
            .set("y", entity.origin.z - radius)
            .set("width", radius * 2.0)
            .set("height", radius * 2.0)
            .set("fill", color)
            .set("class", "entity")
            .set("data-classname", entity.classname.clone()));
    }

    let (minx, minz, width, depth) = match bounds {
        Some(bounds) => {
            let size = bounds.size();
            (bounds.min.x, bounds.min.z, size.x, size.z)
        }
        None => {
            warn!("level has nothing to draw");
            (0.0, 0.0, 0.0, 0.0)
        }
    };
    Document::new()
        .set("viewBox", (minx, minz, width, depth))
        .add(Style::new(include_str!("level-svg.css")))
        .add(group)
}

