use serde::Serialize;

use crate::mp4box::*;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FtypBox {
    pub major_brand: FourCC,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCC>,
}

impl Mp4Box for FtypBox {
    const TYPE: BoxType = BoxType::FtypBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let mut compatible_brands = Vec::new();
        for brand in self.compatible_brands.iter() {
            compatible_brands.push(brand.to_string());
        }
        let s = format!(
            "major_brand={} minor_version={} compatible_brands={}",
            self.major_brand,
            self.minor_version,
            compatible_brands.join("-")
        );
        Ok(s)
    }
}

impl BlockReader for FtypBox {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let major = reader.get_u32();
        let minor = reader.get_u32();

        let brand_count = reader.remaining() / 4;
        let mut brands = Vec::with_capacity(brand_count);

        for _ in 0..brand_count {
            brands.push(From::from(reader.get_u32()));
        }

        Ok(FtypBox {
            major_brand: From::from(major),
            minor_version: minor,
            compatible_brands: brands,
        })
    }

    fn size_hint() -> usize {
        8
    }
}
