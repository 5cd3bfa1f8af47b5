/// Converts coordinates of a rotated grid to geographic coordinates.
///
/// The rotated system is defined by the position of its southern pole. Latitudes and
/// longitudes are paired by index; the output has the length of the shorter input.
/// Returned longitudes are in `[-180, 180]`.
pub fn unrotate(
    latitudes: &[f64],
    longitudes: &[f64],
    south_pole_lat: f64,
    south_pole_lon: f64,
) -> (Vec<f64>, Vec<f64>) {
    let theta = (-(south_pole_lat + 90.0)).to_radians();
    let phi = (-south_pole_lon).to_radians();

    let (sin_theta, cos_theta) = theta.sin_cos();
    let (sin_phi, cos_phi) = phi.sin_cos();

    latitudes
        .iter()
        .zip(longitudes)
        .map(|(lat, lon)| {
            let (sin_lat, cos_lat) = lat.to_radians().sin_cos();
            let (sin_lon, cos_lon) = lon.to_radians().sin_cos();

            let x = cos_lat * cos_lon;
            let y = cos_lat * sin_lon;
            let z = sin_lat;

            let x2 = cos_theta * cos_phi * x + sin_phi * y + sin_theta * cos_phi * z;
            let y2 = -cos_theta * sin_phi * x + cos_phi * y - sin_theta * sin_phi * z;
            let z2 = -sin_theta * x + cos_theta * z;

            (
                z2.clamp(-1.0, 1.0).asin().to_degrees(),
                y2.atan2(x2).to_degrees(),
            )
        })
        .unzip()
}
