//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use gme_grid::config::AggregationConfig;

/// Writes `contents` to `dir/name` and returns the path.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

/// Reads a CSV file as its header plus rows of cells.
pub fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut rdr = csv::Reader::from_path(path).expect("open csv");
    let header = rdr
        .headers()
        .expect("header")
        .iter()
        .map(str::to_string)
        .collect();
    let rows = rdr
        .records()
        .map(|r| r.expect("row").iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}

/// Index of `name` in a CSV header.
pub fn column(header: &[String], name: &str) -> usize {
    header
        .iter()
        .position(|h| h == name)
        .unwrap_or_else(|| panic!("missing column {name}"))
}

/// Three substations in two obvious clusters: two 220 kV sites near Milan
/// and one 132 kV site in the south.
///
/// Lines: a–c at 220 kV (one inter-cluster edge), a–b (internal), and one
/// with an unknown endpoint. Generators: CCGT in the north, solar in the
/// south, and hydro with no coordinates.
pub fn two_cluster_grid(dir: &Path) -> AggregationConfig {
    let substations = write_file(
        dir,
        "substations.csv",
        "id,voltage_kv,lat,lon,name,country\n\
         a,220,45.0,9.0,Alpha,IT\n\
         b,220,45.0,9.01,Beta,IT\n\
         c,132,41.0,14.0,Gamma,IT\n\
         low,66,44.0,10.0,Low,IT\n",
    );
    let lines = write_file(
        dir,
        "lines.csv",
        "id,bus0,bus1,voltage_kv,length_km,circuits,kind,p_nom\n\
         l1,a,c,220,600,1,AC,\n\
         l2,a,b,220,1,1,AC,\n\
         l3,a,zz,220,10,1,AC,\n",
    );
    let generators = write_file(
        dir,
        "generators.csv",
        "id,lat,lon,carrier,capacity_mw,name\n\
         g1,45.0,9.0,CCGT,400,North CCGT\n\
         g2,41.0,14.0,solar,50,South PV\n\
         g3,,,hydro,100,Unknown hydro\n",
    );
    let demand = write_file(
        dir,
        "demand.csv",
        "timestamp,demand_mw\n\
         2024-01-01 00:00,1000\n\
         2024-01-01 01:00,1200\n\
         2024-01-01 02:00,900\n",
    );

    let mut config = AggregationConfig::italy_30();
    config.input.substations = substations;
    config.input.lines = lines;
    config.input.generators = generators;
    config.input.demand = demand;
    config.output.dir = dir.join("out");
    config.reduction.n_clusters = 2;
    config
}

const REGIONS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {"type": "Feature", "properties": {"reg_name": "Lombardia"},
         "geometry": {"type": "Polygon",
            "coordinates": [[[9.0, 45.0], [10.0, 45.0], [10.0, 46.0], [9.0, 46.0], [9.0, 45.0]]]}},
        {"type": "Feature", "properties": {"reg_name": "Sicilia"},
         "geometry": {"type": "Polygon",
            "coordinates": [[[13.0, 37.0], [15.0, 37.0], [15.0, 38.0], [13.0, 38.0], [13.0, 37.0]]]}}
    ]
}"#;

/// Italian and French substations over two region polygons, plus one
/// German site that the country filter removes.
pub fn zonal_grid(dir: &Path) -> AggregationConfig {
    let substations = write_file(
        dir,
        "buses.csv",
        "bus_id,voltage,y,x,country\n\
         milano,380,45.5,9.5,IT\n\
         catania,380,37.5,14.0,IT\n\
         lyon,380,46.0,6.0,FR\n\
         munich,380,48.1,11.6,DE\n",
    );
    let lines = write_file(
        dir,
        "lines.csv",
        "line_id,bus0,bus1,voltage,length,circuits,carrier,p_nom\n\
         n_s,milano,catania,380,900,2,AC,\n\
         n_f,milano,lyon,380,350,1,AC,\n\
         n_d,milano,munich,380,400,1,AC,\n",
    );
    let generators = write_file(
        dir,
        "generators.csv",
        "id,lat,lon,carrier,p_nom\n\
         g1,45.5,9.5,hydro,800\n\
         g2,37.5,14.0,wind,300\n",
    );
    let demand = write_file(
        dir,
        "demand.csv",
        "snapshot,load\n2024-01-01 00:00,30000\n2024-01-01 01:00,32000\n",
    );
    let regions = write_file(dir, "regions.geojson", REGIONS);

    let mut config = AggregationConfig::gme_zonal();
    config.input.substations = substations;
    config.input.lines = lines;
    config.input.generators = generators;
    config.input.demand = demand;
    config.input.regions = Some(regions);
    config.output.dir = dir.join("zonal");
    config.reduction.include_zones = vec!["SARD".to_string()];
    config
}

/// Writes one day of downloaded market tables for `date` into `dir`.
///
/// Transits cover the NORD–CNOR and CSUD–SUD corridors in hours 8 and 13,
/// limits are published for hour 8 only, and MSD results carry volumes in
/// NORD and SUD.
pub fn market_day(dir: &Path, date: &str) {
    write_file(
        dir,
        &format!("MGP_ME_Transits_{date}.csv"),
        "FlowDate,Hour,Period,From,To,Transit\n\
         20251230,8,1,NORD,CNOR,1500\n\
         20251230,8,2,NORD,CNOR,-1000\n\
         20251230,13,1,NORD,CNOR,500\n\
         20251230,8,1,CSUD,SUD,-300\n\
         20251230,13,1,CSUD,SUD,600\n",
    );
    write_file(
        dir,
        &format!("MGP_ME_TransmissionLimits_{date}.csv"),
        "FlowDate,Hour,Period,From,To,MaxTransmissionLimitFrom,MaxTransmissionLimitTo\n\
         20251230,8,1,NORD,CNOR,3000,2500\n\
         20251230,8,2,NORD,CNOR,2000,2500\n\
         20251230,8,1,CSUD,SUD,1200,1000\n",
    );
    write_file(
        dir,
        &format!("MGP_ME_ZonalPrices_{date}.csv"),
        "FlowDate,Hour,Period,Zone,Price\n\
         20251230,8,1,NORD,100\n\
         20251230,8,1,SUD,90\n\
         20251230,8,1,PUN,97\n\
         20251230,12,1,NORD,110\n\
         20251230,12,2,NORD,120\n\
         20251230,12,1,PUN,112\n\
         20251230,13,1,NORD,80\n\
         20251230,13,1,CALA,95\n",
    );
    write_file(
        dir,
        &format!("MSD_ME_MSDExAnteResults_{date}.csv"),
        "FlowDate,Hour,Period,Zone,VolumesPurchased,VolumesSold,AveragePurchasingPrice\n\
         20251230,8,1,NORD,50,10,150\n\
         20251230,8,1,SUD,0,0,\n\
         20251230,13,1,SUD,20,40,95\n",
    );
}

/// Zonal network tables as the aggregation writes them.
pub fn zonal_network(dir: &Path) {
    fs::create_dir_all(dir).expect("create network dir");
    write_file(
        dir,
        "buses.csv",
        "bus_id,lat,lon,region,n_substations,max_voltage_kv,load_weight\n\
         NORD,45.4,9.9,NORD,10,380.0,0.5\n\
         CNOR,43.4,11.5,CNOR,5,380.0,0.2\n\
         SICI,37.5,14.1,SICI,4,380.0,0.2\n\
         FRAN,45.5,5.5,FRAN,1,380.0,0.1\n",
    );
    write_file(
        dir,
        "lines.csv",
        "line_id,bus0,bus1,voltage_kv,length_km,s_nom,x,n_lines,kind,capacity_origin\n\
         CNOR_NORD,CNOR,NORD,380.0,200.000,4000.0,0.020000,3,AC,estimated\n",
    );
}
